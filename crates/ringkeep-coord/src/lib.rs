//! ringkeep-coord — coordination service access for ringkeep.
//!
//! Defines the [`Coordinator`] capability the update daemon consumes
//! (daemon state get/set, change subscriptions, ring group lookup) and
//! [`LocalCoordinator`], an implementation backed by
//! [redb](https://docs.rs/redb) for single-site deployments and tests.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` columns. Every state
//! write bumps a global revision stored in the `meta` table; the revision
//! travels with each [`DaemonStateChange`] so subscribers can drop
//! duplicate deliveries.
//!
//! `LocalCoordinator` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod coordinator;
pub mod error;
pub mod store;
pub mod tables;

pub use coordinator::{Coordinator, DaemonStateChange, Subscription};
pub use error::{CoordError, CoordResult};
pub use store::{DaemonStateRecord, LocalCoordinator};
