//! Swarm orchestration engine.
//!
//! Coordinates many workers on one repository: each task gets its own
//! branch, finished work is merged into a per-swarm integration branch, and
//! the integration branch is finally landed on the target branch.

pub mod config;
pub mod core;
pub mod error;
pub mod git;
pub mod lock;
pub mod log;
pub mod manager;
pub mod outcome;
pub mod retry;
pub mod store;

pub use config::Config;
pub use self::core::{Swarm, SwarmGraph, SwarmStatus, Task, TaskId, TaskStatus};
pub use error::{Error, Result};
pub use git::{GitCli, GitError, GitRunner};
pub use lock::{SwarmLock, SwarmLocks};
pub use manager::SwarmManager;
pub use outcome::{BestEffort, CleanupReport};
pub use retry::{is_transient_fetch_error, RetryPolicy};
pub use store::{JsonSwarmStore, MemoryStore, SwarmStore};
