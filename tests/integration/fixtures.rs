//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating temporary git repositories, optionally with a bare remote
//! - Worker branches carrying one commit each
//! - Predefined swarms stored the way the CLI stores them

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use swarm::core::{Swarm, Task};
use swarm::{Config, JsonSwarmStore, SwarmManager};

/// A test repository with a temporary directory and initialized git.
pub struct TestRepo {
    /// Holds the working repository and, if requested, the bare remote.
    pub temp_dir: TempDir,
    /// Path to the repository root.
    pub path: PathBuf,
    /// Path to the bare `origin` remote, if any.
    pub remote: Option<PathBuf>,
}

impl TestRepo {
    /// Create a repository on `main` with an initial commit and no remote.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("work");
        std::fs::create_dir_all(&path).expect("Failed to create work dir");

        run_git(&path, &["init", "--quiet"]);
        run_git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(&path, &["config", "user.email", "test@test.com"]);
        run_git(&path, &["config", "user.name", "Test User"]);
        run_git(&path, &["config", "commit.gpgsign", "false"]);

        std::fs::write(path.join("README.md"), "# Test Repository\n").expect("Failed to write README");
        std::fs::write(path.join(".gitignore"), ".swarm/\n.swarm-locks/\n")
            .expect("Failed to write .gitignore");
        run_git(&path, &["add", "."]);
        run_git(&path, &["commit", "--quiet", "-m", "Initial commit"]);

        Self {
            temp_dir,
            path,
            remote: None,
        }
    }

    /// Like [`TestRepo::new`], with a bare `origin` that already has `main`.
    pub fn with_remote() -> Self {
        let mut repo = Self::new();
        let remote = repo.temp_dir.path().join("origin.git");
        run_git(repo.temp_dir.path(), &["init", "--quiet", "--bare", "origin.git"]);
        repo.git(&["remote", "add", "origin", &remote.to_string_lossy()]);
        repo.git(&["push", "--quiet", "origin", "main"]);
        repo.remote = Some(remote);
        repo
    }

    /// Run git in the repository, panicking on failure.
    pub fn git(&self, args: &[&str]) -> String {
        run_git(&self.path, args)
    }

    /// Run git in the repository, returning the raw output.
    pub fn try_git(&self, args: &[&str]) -> Output {
        Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("Failed to run git")
    }

    /// Run git against the bare remote.
    pub fn remote_git(&self, args: &[&str]) -> Output {
        let remote = self.remote.as_ref().expect("repository has no remote");
        Command::new("git")
            .args(args)
            .current_dir(remote)
            .output()
            .expect("Failed to run git")
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> String {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        self.try_git(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
            .status
            .success()
    }

    pub fn remote_branch_exists(&self, branch: &str) -> bool {
        self.remote_git(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
            .status
            .success()
    }

    /// Every ref and the commit it points at.
    pub fn refs(&self) -> String {
        self.git(&["for-each-ref", "--format=%(refname) %(objectname)"])
    }

    /// Create `branch` from `base` with one commit writing `filename`, then
    /// return to the branch that was checked out before.
    pub fn worker_branch(&self, branch: &str, base: &str, filename: &str, content: &str) -> String {
        let previous = self.current_branch();
        self.git(&["checkout", "--quiet", "-b", branch, base]);
        let commit = self.commit_file(filename, content, &format!("Work on {}", branch));
        self.git(&["checkout", "--quiet", &previous]);
        commit
    }

    /// Write a file and commit it on the current branch.
    pub fn commit_file(&self, filename: &str, content: &str, message: &str) -> String {
        let file_path = self.path.join(filename);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        self.git(&["add", filename]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn read_file(&self, filename: &str) -> Option<String> {
        std::fs::read_to_string(self.path.join(filename)).ok()
    }

    /// Store under the repository, as the CLI uses it.
    pub fn store(&self) -> JsonSwarmStore {
        JsonSwarmStore::for_repo(&self.path, &test_config().store_dir)
    }

    pub fn save_swarm(&self, swarm: &Swarm) {
        self.store().save_swarm(swarm).expect("Failed to save swarm");
    }

    pub fn manager(&self) -> SwarmManager<JsonSwarmStore> {
        SwarmManager::open(&self.path, self.store(), &test_config()).expect("Failed to open manager")
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Defaults with retry delays short enough for tests.
pub fn test_config() -> Config {
    Config {
        fetch_base_delay_ms: 1,
        command_timeout_secs: Some(60),
        ..Config::default()
    }
}

/// Diamond swarm: A, then B and C in parallel, then D.
///
/// B and C are assigned to workers Toast and Nux.
pub fn diamond_swarm(id: &str, base_commit: &str) -> Swarm {
    let mut b = Task::new("B", "Task B").depends_on("A");
    b.assign(id, "Toast");
    let mut c = Task::new("C", "Task C").depends_on("A");
    c.assign(id, "Nux");
    Swarm::new(id, base_commit)
        .with_task(Task::new("A", "Task A"))
        .with_task(b)
        .with_task(c)
        .with_task(Task::new("D", "Task D").depends_on("B").depends_on("C"))
}
