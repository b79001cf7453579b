//! Result of one orchestration run.

use std::fmt;

use ringkeep_core::{DomainId, PartitionNumber, UpdateTask};
use serde::{Deserialize, Serialize};

/// A partition update that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: UpdateTask,
    pub error: String,
}

/// Aggregate of every task attempted in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub succeeded: Vec<UpdateTask>,
    pub failed: Vec<TaskFailure>,
}

impl UpdateOutcome {
    pub fn record_success(&mut self, task: UpdateTask) {
        self.succeeded.push(task);
    }

    pub fn record_failure(&mut self, task: UpdateTask, error: impl Into<String>) {
        self.failed.push(TaskFailure {
            task,
            error: error.into(),
        });
    }

    /// True when no task failed. A run with zero tasks is a success.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `(domain, partition)` of every failed task, in task order.
    pub fn failed_tasks(&self) -> Vec<(DomainId, PartitionNumber)> {
        self.failed
            .iter()
            .map(|f| (f.task.domain_id, f.task.partition))
            .collect()
    }

    /// Order both lists by task identity; completion order is not stable.
    pub(crate) fn sort(&mut self) {
        self.succeeded.sort();
        self.failed.sort_by(|a, b| a.task.cmp(&b.task));
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )?;
        if !self.failed.is_empty() {
            let tasks: Vec<String> = self.failed.iter().map(|f| f.task.to_string()).collect();
            write!(f, " ({})", tasks.join(", "))?;
        }
        Ok(())
    }
}
