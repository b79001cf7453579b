//! ringkeepd — wiring for the ringkeep update daemon binary.
//!
//! - **`settings`** — CLI config flags layered over the TOML config file
//! - **`daemon_mode`** — opens the coordinator, runs the daemon and status API
//! - **`trigger`** — offline "mark this host updateable" helper
//! - **`api`** — status/admin HTTP routes
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/api/v1/status` | Daemon status and persisted state |
//! | POST | `/api/v1/trigger` | Mark this host updateable |

pub mod api;
pub mod daemon_mode;
pub mod settings;
pub mod trigger;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,ringkeepd=debug,ringkeep=debug";
