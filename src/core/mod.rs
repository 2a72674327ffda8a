//! Swarm data model and the dependency scheduler.
//!
//! Everything here is a pure view over records loaded from the store.

pub mod dag;
pub mod status;
pub mod swarm;
pub mod task;

pub use dag::SwarmGraph;
pub use status::{BlockedTask, SwarmStatus};
pub use swarm::{integration_branch_name, worker_branch_name, Swarm, DEFAULT_TARGET_BRANCH};
pub use task::{Task, TaskId, TaskStatus};
