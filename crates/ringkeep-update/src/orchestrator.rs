//! Update orchestration: derive this host's partition tasks from the ring
//! group topology and run them with bounded parallelism.
//!
//! The task set is rebuilt from the coordinator on every run. One failing
//! partition never stops the others; failures are collected into the
//! run's [`UpdateOutcome`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ringkeep_coord::{CoordError, Coordinator};
use ringkeep_core::{DaemonConfig, DomainConfig, DomainId, HostAddress, UpdateTask};
use ringkeep_storage::{EngineRegistry, StorageResult, Updater};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::outcome::UpdateOutcome;

/// The work one run will perform for a host.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub ring_group: String,
    pub ring_number: u32,
    /// Target version of the domain group, if it has any version.
    pub domain_group_version: Option<u64>,
    pub tasks: BTreeSet<UpdateTask>,
    /// Configs of the domains referenced by `tasks`.
    pub domains: BTreeMap<DomainId, DomainConfig>,
}

/// Runs partition updates for one host.
pub struct UpdateOrchestrator<C> {
    coordinator: Arc<C>,
    engines: EngineRegistry,
    config: Arc<DaemonConfig>,
}

impl<C: Coordinator> UpdateOrchestrator<C> {
    pub fn new(coordinator: Arc<C>, engines: EngineRegistry, config: Arc<DaemonConfig>) -> Self {
        Self {
            coordinator,
            engines,
            config,
        }
    }

    /// Derive the task set for `host` from the current topology.
    ///
    /// Domains the host holds no partitions of contribute nothing. A
    /// domain group without versions yields an empty plan.
    pub fn plan(&self, host: &HostAddress) -> OrchestratorResult<UpdatePlan> {
        let ring_group_name = &self.config.ring_group;
        let ring_group = self
            .coordinator
            .get_ring_group_config(ring_group_name)
            .map_err(|e| match e {
                CoordError::NotFound(_) => OrchestratorError::ConfigNotFound(ring_group_name.clone()),
                other => OrchestratorError::Coordinator(other),
            })?;

        let ring = ring_group
            .ring_config_for_host(host)
            .ok_or_else(|| OrchestratorError::HostNotInRing {
                host: host.clone(),
                ring_group: ring_group.name.clone(),
            })?;
        if ring.ring_number != self.config.ring_number {
            warn!(
                %host,
                configured = self.config.ring_number,
                topology = ring.ring_number,
                "host found in a different ring than configured"
            );
        }

        let mut plan = UpdatePlan {
            ring_group: ring_group.name.clone(),
            ring_number: ring.ring_number,
            ..UpdatePlan::default()
        };

        let Some(latest) = ring_group.domain_group.latest_version() else {
            info!(domain_group = %ring_group.domain_group.name, "domain group has no versions, nothing to update");
            return Ok(plan);
        };
        plan.domain_group_version = Some(latest.version_number);

        for entry in &latest.domains {
            let domain = &entry.domain;
            if plan.domains.contains_key(&domain.id) {
                warn!(domain = %domain.name, id = domain.id, "domain listed twice in domain group version, keeping first");
                continue;
            }
            let partitions = ring.domain_partitions_for_host(host, domain.id);
            if partitions.is_empty() {
                debug!(domain = %domain.name, "host holds no partitions of domain");
                continue;
            }
            for partition in partitions {
                plan.tasks.insert(UpdateTask {
                    domain_id: domain.id,
                    domain_name: domain.name.clone(),
                    partition,
                    target_version: entry.version,
                });
            }
            plan.domains.insert(domain.id, domain.clone());
        }

        Ok(plan)
    }

    /// Update every partition this host holds to its target version.
    ///
    /// Returns once every task finished. Topology errors abort the run
    /// before any task starts; task failures land in the outcome.
    pub async fn run_update(&self, host: &HostAddress) -> OrchestratorResult<UpdateOutcome> {
        let plan = self.plan(host)?;
        let concurrency = self.config.update_concurrency.max(1);
        info!(
            %host,
            ring_group = %plan.ring_group,
            ring = plan.ring_number,
            version = ?plan.domain_group_version,
            tasks = plan.tasks.len(),
            concurrency,
            "starting update run"
        );

        let mut outcome = UpdateOutcome::default();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut running = JoinSet::new();
        let mut pending = BTreeSet::new();

        for task in plan.tasks {
            let updater = match plan
                .domains
                .get(&task.domain_id)
                .map(|domain| self.updater_for(domain, &task))
            {
                Some(Ok(updater)) => updater,
                Some(Err(e)) => {
                    warn!(%task, error = %e, "cannot create updater");
                    outcome.record_failure(task, e.to_string());
                    continue;
                }
                None => {
                    outcome.record_failure(task, "domain missing from plan");
                    continue;
                }
            };

            pending.insert(task.clone());
            let semaphore = Arc::clone(&semaphore);
            running.spawn(async move {
                let _permit = semaphore.acquire().await;
                let version = task.target_version;
                let result = tokio::task::spawn_blocking(move || updater.update(version)).await;
                (task, result)
            });
        }

        while let Some(joined) = running.join_next().await {
            let (task, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "update task was lost");
                    continue;
                }
            };
            pending.remove(&task);
            match result {
                Ok(Ok(())) => {
                    debug!(%task, "partition updated");
                    outcome.record_success(task);
                }
                Ok(Err(e)) => {
                    warn!(%task, error = %e, "partition update failed");
                    outcome.record_failure(task, e.to_string());
                }
                Err(e) => {
                    error!(%task, error = %e, "partition updater panicked");
                    outcome.record_failure(task, format!("updater panicked: {e}"));
                }
            }
        }

        for task in pending {
            outcome.record_failure(task, "update task did not report a result");
        }

        outcome.sort();
        if outcome.is_success() {
            info!(%host, %outcome, "update run complete");
        } else {
            warn!(%host, %outcome, "update run finished with failures");
        }
        Ok(outcome)
    }

    fn updater_for(
        &self,
        domain: &DomainConfig,
        task: &UpdateTask,
    ) -> StorageResult<Box<dyn Updater>> {
        self.engines
            .resolve(domain)?
            .updater(&self.config, task.partition)
    }
}
