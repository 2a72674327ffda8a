//! Branch lifecycle controller.
//!
//! SwarmManager is the facade over the store, the scheduler, the git
//! executor and the lock manager. Every operation that mutates branch state
//! holds the swarm's lock from before it loads the swarm until it returns,
//! network round trips included.
//!
//! Branch lifecycle per swarm:
//!
//! ```text
//! none -> created -> (merging)* -> landed
//!            \___________\____________> cleaned
//! ```

use std::path::Path;

use crate::config::Config;
use crate::core::{worker_branch_name, Swarm, SwarmGraph, SwarmStatus, Task};
use crate::git::{GitCli, GitError, GitRunner};
use crate::lock::{SwarmLock, SwarmLocks};
use crate::outcome::{BestEffort, CleanupAction, CleanupReport, CleanupStep};
use crate::retry::{self, RetryPolicy};
use crate::store::SwarmStore;
use crate::{swlog, swlog_debug, swlog_warn, Error, Result};

/// Locks held for one operation. The worktree lock is declared first so it
/// is released before the swarm lock.
struct Held {
    _worktree: Option<SwarmLock>,
    _swarm: SwarmLock,
}

pub struct SwarmManager<S, G = GitCli> {
    store: S,
    git: G,
    locks: SwarmLocks,
    retry: RetryPolicy,
    remote: String,
    serialize_worktree: bool,
}

impl<S: SwarmStore> SwarmManager<S, GitCli> {
    /// Manager running the real `git` against `repo_root`.
    pub fn open(repo_root: &Path, store: S, config: &Config) -> Result<Self> {
        let git = GitCli::new(repo_root)?.with_timeout(config.command_timeout());
        Ok(Self::with_git(repo_root, store, git, config))
    }
}

impl<S: SwarmStore, G: GitRunner> SwarmManager<S, G> {
    pub fn with_git(repo_root: &Path, store: S, git: G, config: &Config) -> Self {
        Self {
            store,
            git,
            locks: SwarmLocks::for_repo(repo_root, &config.lock_dir),
            retry: config.retry_policy(),
            remote: config.remote.clone(),
            serialize_worktree: config.serialize_worktree,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn locks(&self) -> &SwarmLocks {
        &self.locks
    }

    pub fn load_swarm(&self, swarm_id: &str) -> Result<Swarm> {
        self.store.load_swarm(swarm_id)
    }

    fn lock_swarm(&self, swarm_id: &str) -> Result<Held> {
        let swarm = self.locks.acquire(swarm_id)?;
        let worktree = self.lock_worktree()?;
        Ok(Held {
            _worktree: worktree,
            _swarm: swarm,
        })
    }

    fn lock_worktree(&self) -> Result<Option<SwarmLock>> {
        if self.serialize_worktree {
            Ok(Some(self.locks.acquire_worktree()?))
        } else {
            Ok(None)
        }
    }

    // ========== Scheduling ==========

    pub fn get_ready_tasks(&self, swarm_id: &str) -> Result<Vec<Task>> {
        let swarm = self.load_swarm(swarm_id)?;
        let graph = SwarmGraph::from_swarm(&swarm);
        Ok(graph.ready_tasks().into_iter().cloned().collect())
    }

    pub fn get_blocked_tasks(&self, swarm_id: &str) -> Result<Vec<Task>> {
        let swarm = self.load_swarm(swarm_id)?;
        let graph = SwarmGraph::from_swarm(&swarm);
        Ok(graph.blocked_tasks().into_iter().cloned().collect())
    }

    pub fn is_complete(&self, swarm_id: &str) -> Result<bool> {
        let swarm = self.load_swarm(swarm_id)?;
        Ok(SwarmGraph::from_swarm(&swarm).is_complete())
    }

    /// Tasks grouped by topological depth, for reporting only.
    pub fn waves(&self, swarm_id: &str) -> Result<Vec<Vec<Task>>> {
        let swarm = self.load_swarm(swarm_id)?;
        let graph = SwarmGraph::from_swarm(&swarm);
        Ok(graph
            .waves()
            .into_iter()
            .map(|wave| wave.into_iter().cloned().collect())
            .collect())
    }

    pub fn status(&self, swarm_id: &str) -> Result<SwarmStatus> {
        let swarm = self.load_swarm(swarm_id)?;
        Ok(SwarmStatus::from_swarm(&swarm))
    }

    // ========== Branch lifecycle ==========

    /// Create the integration branch from the swarm's base commit.
    ///
    /// Fails with [`Error::BranchExists`] without touching the repository if
    /// the branch is already there. The upstream push is best-effort; a
    /// repository without a remote is fine.
    pub fn create_integration_branch(&self, swarm_id: &str) -> Result<()> {
        let _held = self.lock_swarm(swarm_id)?;
        let swarm = self.load_swarm(swarm_id)?;
        let branch = swarm.integration.as_str();

        if self.git.branch_exists(branch) {
            return Err(Error::BranchExists(branch.to_string()));
        }

        self.git
            .run(&["checkout", "-b", branch, &swarm.base_commit])
            .map_err(|e| Error::step("creating branch", e))?;

        BestEffort::observe(
            "push integration branch",
            self.git.run(&["push", "-u", &self.remote, branch]),
        );

        swlog!(
            "swarm {}: created {} at {}",
            swarm_id,
            branch,
            swarm.base_commit
        );
        Ok(())
    }

    /// Merge a worker branch into the integration branch.
    ///
    /// A merge that leaves unmerged paths returns the raw [`Error::Git`] so
    /// the caller can tell a conflict from any other failure, which comes
    /// back as `merging: ...`.
    pub fn merge_to_integration(&self, swarm_id: &str, worker_branch: &str) -> Result<()> {
        let _held = self.lock_swarm(swarm_id)?;
        let swarm = self.load_swarm(swarm_id)?;
        let integration = swarm.integration.as_str();

        self.ensure_on_integration(integration)?;

        // A failed fetch still falls through to a local merge, even when the
        // failure is permanent; a missing branch surfaces from the merge.
        BestEffort::observe(
            "fetch worker branch",
            self.fetch_with_retry(&self.remote, worker_branch),
        );

        let message = format!("Merge {} into {}", worker_branch, integration);
        if let Err(err) = self
            .git
            .run(&["merge", "--no-ff", "-m", &message, worker_branch])
        {
            return Err(self.merge_failure(err, "merging"));
        }

        swlog!("swarm {}: merged {} into {}", swarm_id, worker_branch, integration);
        Ok(())
    }

    fn ensure_on_integration(&self, integration: &str) -> Result<()> {
        let current = self
            .git
            .current_branch()
            .map_err(|e| Error::step("getting current branch", e))?;
        if current == integration {
            return Ok(());
        }

        if !self.git.branch_exists(integration) {
            return Err(Error::BranchNotFound(integration.to_string()));
        }
        self.git
            .run(&["checkout", integration])
            .map_err(|e| Error::step("checking out integration", e))?;

        let now = self
            .git
            .current_branch()
            .map_err(|e| Error::step("getting current branch", e))?;
        if now != integration {
            return Err(Error::NotOnIntegrationBranch {
                expected: integration.to_string(),
                actual: now,
            });
        }
        Ok(())
    }

    /// Land the integration branch on the target branch and push it.
    ///
    /// Unlike the fetch, the final push is mandatory.
    pub fn land_to_main(&self, swarm_id: &str) -> Result<()> {
        let _held = self.lock_swarm(swarm_id)?;
        let swarm = self.load_swarm(swarm_id)?;
        let target = swarm.target_branch.as_str();
        let integration = swarm.integration.as_str();

        if !self.git.branch_exists(integration) {
            return Err(Error::BranchNotFound(integration.to_string()));
        }

        self.git
            .run(&["checkout", target])
            .map_err(|e| Error::step(format!("checking out {}", target), e))?;

        BestEffort::observe(
            "fetch target branch",
            self.fetch_with_retry(&self.remote, target),
        );

        let message = format!("Land swarm {}", swarm_id);
        if let Err(err) = self
            .git
            .run(&["merge", "--no-ff", "-m", &message, integration])
        {
            return Err(self.merge_failure(err, &format!("merging to {}", target)));
        }

        self.git
            .run(&["push", &self.remote, target])
            .map_err(|e| Error::step("pushing", e))?;

        swlog!("swarm {}: landed {} on {}", swarm_id, integration, target);
        Ok(())
    }

    /// Conflicts come back unwrapped; anything else is wrapped with `step`.
    fn merge_failure(&self, err: GitError, step: &str) -> Error {
        match self.git.conflicting_files() {
            Ok(files) if !files.is_empty() => {
                swlog_warn!("merge conflict in {}: {}", files.len(), files.join(", "));
                Error::Git(err)
            }
            _ => Error::step(step, err),
        }
    }

    /// Abort an in-progress merge.
    pub fn abort_merge(&self) -> Result<()> {
        let _worktree = self.lock_worktree()?;
        self.git.run(&["merge", "--abort"])?;
        Ok(())
    }

    /// Delete every branch belonging to the swarm, locally and remotely.
    ///
    /// Only a failure to delete the local integration branch is returned.
    pub fn cleanup_branches(&self, swarm_id: &str) -> Result<()> {
        self.cleanup_report(swarm_id)?.into_result()
    }

    /// Like [`SwarmManager::cleanup_branches`], returning every attempted
    /// step with its outcome.
    pub fn cleanup_report(&self, swarm_id: &str) -> Result<CleanupReport> {
        let _held = self.lock_swarm(swarm_id)?;
        let swarm = self.load_swarm(swarm_id)?;
        let integration = swarm.integration.as_str();

        let integration_local = self.git.run(&["branch", "-D", integration]).map(|_| ());
        if let Err(e) = &integration_local {
            swlog_warn!("swarm {}: deleting {} failed: {}", swarm_id, integration, e);
        }

        let mut steps = vec![self.delete_remote(integration)];
        for branch in swarm.worker_branches() {
            steps.push(self.delete_local(branch));
            steps.push(self.delete_remote(branch));
        }

        let report = CleanupReport {
            swarm_id: swarm_id.to_string(),
            integration: integration.to_string(),
            integration_local,
            steps,
        };
        swlog!(
            "swarm {}: cleanup attempted {} deletions, {} ignored failures",
            swarm_id,
            report.steps.len() + 1,
            report.ignored().count()
        );
        Ok(report)
    }

    fn delete_local(&self, branch: &str) -> CleanupStep {
        CleanupStep {
            action: CleanupAction::DeleteLocal,
            branch: branch.to_string(),
            outcome: BestEffort::observe(
                "delete local branch",
                self.git.run(&["branch", "-D", branch]),
            ),
        }
    }

    fn delete_remote(&self, branch: &str) -> CleanupStep {
        CleanupStep {
            action: CleanupAction::DeleteRemote,
            branch: branch.to_string(),
            outcome: BestEffort::observe(
                "delete remote branch",
                self.git.run(&["push", &self.remote, "--delete", branch]),
            ),
        }
    }

    // ========== Lookups ==========

    pub fn get_integration_branch(&self, swarm_id: &str) -> Result<String> {
        Ok(self.load_swarm(swarm_id)?.integration)
    }

    pub fn get_worker_branch(&self, swarm_id: &str, worker: &str, task_id: &str) -> String {
        worker_branch_name(swarm_id, worker, task_id)
    }

    /// Unmerged paths in the working tree, e.g. after a conflicted merge.
    pub fn conflicting_files(&self) -> Result<Vec<String>> {
        Ok(self.git.conflicting_files()?)
    }

    /// Fetch with bounded retry on transient failures.
    pub fn fetch_with_retry(&self, remote: &str, refname: &str) -> std::result::Result<(), GitError> {
        swlog_debug!("fetching {} from {}", refname, remote);
        retry::fetch_with_retry(&self.git, &self.retry, remote, refname)
    }
}
