//! ringkeep-core — shared types for the ringkeep update daemon.
//!
//! - **`types`** — host identity, daemon lifecycle state, coordinator keys
//! - **`topology`** — ring groups, rings, domain groups and their versions
//! - **`config`** — the daemon's TOML configuration
//! - **`resolve`** — one-shot local host resolution at startup

pub mod config;
pub mod error;
pub mod resolve;
pub mod topology;
pub mod types;

pub use config::{CoordinatorConfig, DaemonConfig};
pub use error::{ConfigError, ResolveError};
pub use topology::*;
pub use types::*;
