//! Task records as seen by the engine.
//!
//! Tasks come from the external dependency store. The engine reads their
//! status and dependency edges but never decides when a task is done.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifier of a task within a swarm, as issued by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Task status as recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl TaskStatus {
    /// Only closed tasks satisfy their dependents.
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Closed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Open => write!(f, "open"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "closed" | "done" => Ok(TaskStatus::Closed),
            other => Err(Error::Validation(format!("unknown task status: {}", other))),
        }
    }
}

/// One unit of work in a swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    /// Worker assigned to the task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    /// Worker branch, `<swarm>/<worker>/<task>` once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Tasks that must be closed before this one is ready.
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            worker: None,
            branch: None,
            depends_on: Vec::new(),
            status: TaskStatus::Open,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<TaskId>) -> Self {
        let dep = dep.into();
        if !self.depends_on.contains(&dep) {
            self.depends_on.push(dep);
        }
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Assign a worker and derive its branch name.
    pub fn assign(&mut self, swarm_id: &str, worker: &str) {
        self.branch = Some(super::swarm::worker_branch_name(
            swarm_id,
            worker,
            self.id.as_str(),
        ));
        self.worker = Some(worker.to_string());
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// The worker branch, ignoring empty values from the store.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.is_empty())
    }
}
