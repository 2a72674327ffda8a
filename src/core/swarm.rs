//! Swarm records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskId};
use crate::{Error, Result};

pub const DEFAULT_TARGET_BRANCH: &str = "main";

/// Integration branch name given to new swarm records.
pub fn integration_branch_name(swarm_id: &str) -> String {
    format!("swarm/{}", swarm_id)
}

/// Branch a worker uses for one task. Pure; distinct (worker, task) pairs
/// never collide within a swarm.
pub fn worker_branch_name(swarm_id: &str, worker: &str, task_id: &str) -> String {
    format!("{}/{}/{}", swarm_id, worker, task_id)
}

/// A swarm as loaded from the store.
///
/// The engine never writes this back; each operation loads a fresh copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swarm {
    pub id: String,
    /// Commit the integration branch is created from.
    pub base_commit: String,
    /// Integration branch name, fixed for the swarm's lifetime.
    pub integration: String,
    /// Branch the swarm lands on.
    pub target_branch: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Swarm {
    pub fn new(id: &str, base_commit: &str) -> Self {
        Self {
            id: id.to_string(),
            base_commit: base_commit.to_string(),
            integration: integration_branch_name(id),
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn with_target(mut self, target_branch: &str) -> Self {
        self.target_branch = target_branch.to_string();
        self
    }

    pub fn with_integration(mut self, integration: &str) -> Self {
        self.integration = integration.to_string();
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// Worker branches recorded on the swarm's tasks, in task order.
    pub fn worker_branches(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().filter_map(Task::branch)
    }

    /// Reject records the engine cannot act on safely.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation("swarm id must not be empty".to_string()));
        }
        if self.id.contains('/') {
            return Err(Error::Validation(format!(
                "swarm id {} must not contain '/'",
                self.id
            )));
        }
        for (field, value) in [
            ("base_commit", &self.base_commit),
            ("integration", &self.integration),
            ("target_branch", &self.target_branch),
        ] {
            if value.is_empty() {
                return Err(Error::Validation(format!(
                    "swarm {}: {} must not be empty",
                    self.id, field
                )));
            }
        }
        if self.integration == self.target_branch {
            return Err(Error::Validation(format!(
                "swarm {}: integration and target branch are both {}",
                self.id, self.integration
            )));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(&task.id) {
                return Err(Error::Validation(format!(
                    "swarm {}: duplicate task {}",
                    self.id, task.id
                )));
            }
            // Worker branches are `<swarm>/<worker>/<task>`; a '/' inside
            // either part would let two assignments share a branch.
            if task.id.as_str().contains('/') {
                return Err(Error::Validation(format!(
                    "swarm {}: task id {} must not contain '/'",
                    self.id, task.id
                )));
            }
            if let Some(worker) = task.worker.as_deref().filter(|w| w.contains('/')) {
                return Err(Error::Validation(format!(
                    "swarm {}: worker {} on task {} must not contain '/'",
                    self.id, worker, task.id
                )));
            }
        }
        Ok(())
    }
}
