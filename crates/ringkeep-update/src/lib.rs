//! ringkeep update daemon — keeps a host's partitions at the domain group's
//! latest version.
//!
//! # Components
//!
//! - **`controller`** — Daemon state machine (notification handling, crash recovery, status)
//! - **`orchestrator`** — Task derivation from topology and bounded parallel updates
//! - **`outcome`** — Per-run success/failure aggregate

pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod outcome;

#[cfg(test)]
mod testing;

pub use controller::{DaemonStatus, HandleResult, RunReport, UpdateDaemon};
pub use error::{DaemonError, DaemonResult, OrchestratorError, OrchestratorResult};
pub use orchestrator::{UpdateOrchestrator, UpdatePlan};
pub use outcome::{TaskFailure, UpdateOutcome};
