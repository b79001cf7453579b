//! Update daemon controller: drives this host's [`DaemonState`] in the
//! coordinator.
//!
//! ```text
//!   Idle ──(external)──▶ Updateable ──▶ Updating ──(all tasks ok)──▶ Idle
//!                                          │
//!                                          └──(any task failed)──▶ stays Updating
//! ```
//!
//! `Updating` is written before any partition is touched, so a crash
//! mid-run leaves a durable marker. On startup a persisted `Updating`
//! resumes the whole run; updaters are idempotent. Only one run is ever
//! in flight per daemon.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ringkeep_coord::{CoordError, Coordinator, DaemonStateChange};
use ringkeep_core::{DaemonConfig, DaemonKey, DaemonKind, DaemonState, HostAddress};
use ringkeep_storage::EngineRegistry;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::orchestrator::UpdateOrchestrator;
use crate::outcome::UpdateOutcome;

/// How long to wait before re-reading the persisted state after a
/// transient coordinator failure.
pub const DEFAULT_RECOVERY_RETRY: Duration = Duration::from_secs(5);

/// What handling one notification amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// Not an actionable change (other states, stale or duplicate revision).
    Ignored,
    /// A run was already in progress; the change was folded into it.
    AlreadyRunning,
    /// A run was performed.
    Ran(UpdateOutcome),
}

/// Summary of the last finished run, as published in [`DaemonStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub finished_at: u64,
}

impl RunReport {
    fn from_outcome(outcome: &UpdateOutcome) -> Self {
        Self {
            succeeded: outcome.succeeded.len(),
            failed: outcome.failed.iter().map(|f| f.task.to_string()).collect(),
            finished_at: unix_now(),
        }
    }
}

/// Point-in-time view of the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub host: HostAddress,
    pub ring_group: String,
    pub ring_number: u32,
    /// Last state this daemon wrote or observed.
    pub state: Option<DaemonState>,
    pub running: bool,
    pub runs_completed: u64,
    pub last_run: Option<RunReport>,
}

/// The update daemon for one host.
pub struct UpdateDaemon<C: Coordinator> {
    coordinator: Arc<C>,
    orchestrator: UpdateOrchestrator<C>,
    host: HostAddress,
    key: DaemonKey,
    run_lock: Mutex<()>,
    last_revision: AtomicU64,
    recovery_retry: Duration,
    status: watch::Sender<DaemonStatus>,
}

impl<C: Coordinator> UpdateDaemon<C> {
    pub fn new(
        config: DaemonConfig,
        host: HostAddress,
        coordinator: Arc<C>,
        engines: EngineRegistry,
    ) -> Self {
        let key = DaemonKey::new(
            config.ring_group.clone(),
            config.ring_number,
            host.clone(),
            DaemonKind::UpdateDaemon,
        );
        let (status, _) = watch::channel(DaemonStatus {
            host: host.clone(),
            ring_group: config.ring_group.clone(),
            ring_number: config.ring_number,
            state: None,
            running: false,
            runs_completed: 0,
            last_run: None,
        });
        let orchestrator =
            UpdateOrchestrator::new(Arc::clone(&coordinator), engines, Arc::new(config));
        Self {
            coordinator,
            orchestrator,
            host,
            key,
            run_lock: Mutex::new(()),
            last_revision: AtomicU64::new(0),
            recovery_retry: DEFAULT_RECOVERY_RETRY,
            status,
        }
    }

    pub fn with_recovery_retry(mut self, retry: Duration) -> Self {
        self.recovery_retry = retry;
        self
    }

    /// Resolve the configured hostname and build the daemon. An
    /// unresolvable host is fatal.
    pub fn from_config(
        config: DaemonConfig,
        coordinator: Arc<C>,
        engines: EngineRegistry,
    ) -> DaemonResult<Self> {
        let host = HostAddress::resolve(&config.hostname, config.port)?;
        info!(%host, ring_group = %config.ring_group, ring = config.ring_number, "update daemon bootstrapped");
        Ok(Self::new(config, host, coordinator, engines))
    }

    pub fn host(&self) -> &HostAddress {
        &self.host
    }

    pub fn key(&self) -> &DaemonKey {
        &self.key
    }

    pub fn coordinator(&self) -> &Arc<C> {
        &self.coordinator
    }

    pub fn status(&self) -> watch::Receiver<DaemonStatus> {
        self.status.subscribe()
    }

    pub fn status_snapshot(&self) -> DaemonStatus {
        self.status.borrow().clone()
    }

    /// Run until `shutdown` flips or its sender is dropped.
    ///
    /// Subscribes before reading the persisted state so no change is lost
    /// between the two, then resumes an interrupted run if there is one.
    /// Coordinator hiccups are logged and the persisted state is re-read
    /// after `recovery_retry`; topology errors and a closed subscription end
    /// the daemon.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DaemonResult<()> {
        let mut changes = self.coordinator.subscribe(&self.key)?;
        info!(key = %self.key, "watching daemon state");

        let mut recovery_pending = self.try_recover().await?;

        loop {
            tokio::select! {
                change = changes.recv() => {
                    let Some(change) = change else {
                        error!(key = %self.key, "state change subscription closed");
                        return Err(DaemonError::Coordinator(CoordError::SubscriptionClosed));
                    };
                    match self.on_daemon_state_change(change).await {
                        Ok(_) => {}
                        Err(e) if e.is_transient() => {
                            error!(error = %e, retry = ?self.recovery_retry, "coordinator error, will re-read state");
                            recovery_pending = true;
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ = tokio::time::sleep(self.recovery_retry), if recovery_pending => {
                    recovery_pending = self.try_recover().await?;
                }
                _ = shutdown.changed() => {
                    info!("update daemon shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// [`recover`](Self::recover), with transient failures reported as
    /// `Ok(true)` so the caller can retry later.
    async fn try_recover(&self) -> DaemonResult<bool> {
        match self.recover().await {
            Ok(_) => Ok(false),
            Err(e) if e.is_transient() => {
                error!(error = %e, "could not act on persisted state");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Act on the state persisted before this process started.
    ///
    /// `Updating` means a previous run was interrupted: redo it. A leftover
    /// `Updateable` is a trigger nobody consumed.
    pub async fn recover(&self) -> DaemonResult<Option<HandleResult>> {
        let state = self.coordinator.get_daemon_state(&self.key)?;
        self.publish_state(state);
        match state {
            Some(DaemonState::Updating) => {
                info!(key = %self.key, "found interrupted update, resuming");
                let Ok(_guard) = self.run_lock.try_lock() else {
                    return Ok(Some(HandleResult::AlreadyRunning));
                };
                self.update_and_finish().await.map(Some)
            }
            Some(DaemonState::Updateable) => {
                info!(key = %self.key, "found pending update request");
                let Ok(_guard) = self.run_lock.try_lock() else {
                    return Ok(Some(HandleResult::AlreadyRunning));
                };
                self.begin_and_update().await.map(Some)
            }
            Some(DaemonState::Idle) | None => {
                debug!(key = %self.key, state = ?state, "nothing to resume");
                Ok(None)
            }
        }
    }

    /// Handle one state change notification.
    ///
    /// Only `Updateable` starts work. Changes at or below the last seen
    /// revision are duplicates, including echoes of this daemon's own
    /// writes. If a run is already in progress the change is absorbed by it.
    /// An update request only counts as seen once `Updating` is stored, so a
    /// redelivery after a failed write is acted on.
    pub async fn on_daemon_state_change(
        &self,
        change: DaemonStateChange,
    ) -> DaemonResult<HandleResult> {
        if change.key != self.key {
            debug!(key = %change.key, "change for another daemon");
            return Ok(HandleResult::Ignored);
        }
        if self.is_stale(&change) {
            return Ok(HandleResult::Ignored);
        }

        if change.state != DaemonState::Updateable {
            self.last_revision.fetch_max(change.revision, Ordering::SeqCst);
            debug!(state = %change.state, "not an update request");
            return Ok(HandleResult::Ignored);
        }

        let Ok(_guard) = self.run_lock.try_lock() else {
            self.last_revision.fetch_max(change.revision, Ordering::SeqCst);
            info!(revision = change.revision, "update already running, request absorbed");
            return Ok(HandleResult::AlreadyRunning);
        };
        // A run that finished while we waited has already covered it.
        if self.is_stale(&change) {
            return Ok(HandleResult::Ignored);
        }
        // The Updating write records a newer revision than the request's.
        self.begin_and_update().await
    }

    fn is_stale(&self, change: &DaemonStateChange) -> bool {
        let last = self.last_revision.load(Ordering::SeqCst);
        if change.revision <= last {
            debug!(revision = change.revision, last, state = %change.state, "duplicate change");
            return true;
        }
        false
    }

    async fn begin_and_update(&self) -> DaemonResult<HandleResult> {
        self.write_state(DaemonState::Updating)?;
        self.update_and_finish().await
    }

    /// Run the orchestrator and settle the state. Caller holds the run lock.
    async fn update_and_finish(&self) -> DaemonResult<HandleResult> {
        self.status.send_modify(|s| s.running = true);
        let result = self.orchestrator.run_update(&self.host).await;
        self.status.send_modify(|s| s.running = false);

        let outcome = result?;
        self.status.send_modify(|s| {
            s.runs_completed += 1;
            s.last_run = Some(RunReport::from_outcome(&outcome));
        });

        if outcome.is_success() {
            self.write_state(DaemonState::Idle)?;
            info!(key = %self.key, %outcome, "update complete");
        } else {
            warn!(
                key = %self.key,
                failed = ?outcome.failed_tasks(),
                "update incomplete, leaving state at updating"
            );
        }
        Ok(HandleResult::Ran(outcome))
    }

    fn write_state(&self, state: DaemonState) -> DaemonResult<()> {
        let revision = self.coordinator.set_daemon_state(&self.key, state)?;
        self.last_revision.fetch_max(revision, Ordering::SeqCst);
        self.publish_state(Some(state));
        debug!(key = %self.key, %state, revision, "daemon state written");
        Ok(())
    }

    fn publish_state(&self, state: Option<DaemonState>) {
        self.status.send_modify(|s| s.state = state);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
