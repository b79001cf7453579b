//! ringkeep-storage — storage backends as seen by the update daemon.
//!
//! The daemon never touches partition bytes itself. Each domain names a
//! storage engine; the engine hands out one [`Updater`] per partition and
//! the updater brings that partition to a target version.
//!
//! # Components
//!
//! - **`engine`** — the `StorageEngine` / `Updater` capabilities and the
//!   `EngineRegistry` that maps a domain's engine name to an implementation
//! - **`marker`** — `VersionMarkerEngine`, a built-in engine that records
//!   the installed version of each partition on local disk

pub mod engine;
pub mod error;
pub mod marker;

pub use engine::{EngineBuilder, EngineRegistry, StorageEngine, Updater};
pub use error::{StorageError, StorageResult};
pub use marker::{VERSION_MARKER_ENGINE, VersionMarkerEngine};
