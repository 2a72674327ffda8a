//! Outcomes of steps that are allowed to fail.
//!
//! A post-create push, a pre-merge fetch or a remote branch deletion may fail
//! without failing the operation around it. Those failures are kept here so
//! they can be inspected, and are never returned to the caller as errors.

use crate::git::GitError;
use crate::{swlog_warn, Error, Result};

#[derive(Debug)]
pub enum BestEffort {
    Succeeded,
    /// Attempted, failed, and deliberately not propagated.
    Ignored(GitError),
}

impl BestEffort {
    /// Record the result of a best-effort step, logging a swallowed failure.
    pub fn observe<T>(step: &str, result: std::result::Result<T, GitError>) -> Self {
        match result {
            Ok(_) => BestEffort::Succeeded,
            Err(err) => {
                swlog_warn!("{} failed (ignored): {}", step, err);
                BestEffort::Ignored(err)
            }
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, BestEffort::Ignored(_))
    }

    pub fn error(&self) -> Option<&GitError> {
        match self {
            BestEffort::Ignored(err) => Some(err),
            BestEffort::Succeeded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    DeleteLocal,
    DeleteRemote,
}

impl std::fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupAction::DeleteLocal => write!(f, "delete local branch"),
            CleanupAction::DeleteRemote => write!(f, "delete remote branch"),
        }
    }
}

#[derive(Debug)]
pub struct CleanupStep {
    pub action: CleanupAction,
    pub branch: String,
    pub outcome: BestEffort,
}

/// Everything a branch cleanup attempted.
///
/// Only the local deletion of the integration branch counts as a failure of
/// the cleanup; every other step is best-effort.
#[derive(Debug)]
pub struct CleanupReport {
    pub swarm_id: String,
    pub integration: String,
    pub integration_local: std::result::Result<(), GitError>,
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    pub fn ignored(&self) -> impl Iterator<Item = &CleanupStep> {
        self.steps.iter().filter(|step| step.outcome.is_ignored())
    }

    pub fn attempted(&self, action: CleanupAction, branch: &str) -> bool {
        self.steps
            .iter()
            .any(|step| step.action == action && step.branch == branch)
    }

    /// The retained failure, if any, returned as the raw git error.
    pub fn into_result(self) -> Result<()> {
        self.integration_local.map_err(Error::Git)
    }
}
