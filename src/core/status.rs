//! Progress summary for a swarm.

use serde::Serialize;

use crate::core::dag::SwarmGraph;
use crate::core::swarm::Swarm;
use crate::core::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    pub id: TaskId,
    pub waiting_on: Vec<TaskId>,
}

/// Snapshot of where a swarm stands: what is done, what can start now, and
/// what is waiting on what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwarmStatus {
    pub swarm_id: String,
    pub integration: String,
    pub target_branch: String,
    pub completed: Vec<TaskId>,
    pub ready: Vec<TaskId>,
    pub blocked: Vec<BlockedTask>,
    pub total: usize,
    pub max_parallelism: usize,
}

impl SwarmStatus {
    pub fn from_swarm(swarm: &Swarm) -> Self {
        let graph = SwarmGraph::from_swarm(swarm);
        let blocked = graph
            .blocked_tasks()
            .into_iter()
            .map(|task| BlockedTask {
                id: task.id.clone(),
                waiting_on: graph.blockers(&task.id).into_iter().cloned().collect(),
            })
            .collect();

        Self {
            swarm_id: swarm.id.clone(),
            integration: swarm.integration.clone(),
            target_branch: swarm.target_branch.clone(),
            completed: graph
                .completed_tasks()
                .into_iter()
                .map(|t| t.id.clone())
                .collect(),
            ready: graph.ready_tasks().into_iter().map(|t| t.id.clone()).collect(),
            blocked,
            total: graph.task_count(),
            max_parallelism: graph.max_parallelism(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.total
    }

    /// Whole-number completion percentage; an empty swarm counts as 100.
    pub fn percent_complete(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        self.completed.len() * 100 / self.total
    }
}

impl std::fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn join(ids: &[TaskId]) -> String {
            ids.iter()
                .map(TaskId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }

        writeln!(
            f,
            "Swarm {} ({} -> {})",
            self.swarm_id, self.integration, self.target_branch
        )?;
        writeln!(
            f,
            "Progress: {}/{} complete ({}%)",
            self.completed.len(),
            self.total,
            self.percent_complete()
        )?;
        if !self.completed.is_empty() {
            writeln!(f, "Completed: {}", join(&self.completed))?;
        }
        if !self.ready.is_empty() {
            writeln!(f, "Ready: {}", join(&self.ready))?;
        }
        for blocked in &self.blocked {
            writeln!(
                f,
                "Blocked: {} (waiting on {})",
                blocked.id,
                join(&blocked.waiting_on)
            )?;
        }
        Ok(())
    }
}
