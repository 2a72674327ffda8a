//! Per-swarm advisory file locks.
//!
//! Each swarm id maps to its own lock file under the repository's lock
//! directory, so unrelated swarms never contend. Locks are OS advisory locks
//! (`flock` on unix), which exclude other processes as well as other handles
//! in this process.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{swlog_debug, swlog_warn, Error, Result};

/// Lock directory name, relative to the repository root.
pub const DEFAULT_LOCK_DIR: &str = ".swarm-locks";

/// Repository-wide lock for operations that touch the shared checkout.
///
/// `escape_id` rewrites every `%`, so no swarm id maps to this name.
const WORKTREE_LOCK_FILE: &str = "%worktree.lock";

#[derive(Debug, Clone)]
pub struct SwarmLocks {
    dir: PathBuf,
}

impl SwarmLocks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_repo(repo_root: &Path, lock_dir: &str) -> Self {
        Self::new(repo_root.join(lock_dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self, swarm_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", escape_id(swarm_id)))
    }

    /// Block until this process holds the lock for `swarm_id`.
    pub fn acquire(&self, swarm_id: &str) -> Result<SwarmLock> {
        if swarm_id.is_empty() {
            return Err(Error::Validation("swarm id must not be empty".to_string()));
        }
        self.lock_file(self.lock_path(swarm_id))
    }

    /// Block until this process holds the repository-wide checkout lock.
    ///
    /// Always take it after a swarm lock, never before.
    pub fn acquire_worktree(&self) -> Result<SwarmLock> {
        self.lock_file(self.dir.join(WORKTREE_LOCK_FILE))
    }

    fn lock_file(&self, path: PathBuf) -> Result<SwarmLock> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::Lock {
            path: self.dir.clone(),
            source,
        })?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::Lock {
                path: path.clone(),
                source,
            })?;

        file.lock_exclusive().map_err(|source| Error::Lock {
            path: path.clone(),
            source,
        })?;

        swlog_debug!("acquired lock {}", path.display());
        Ok(SwarmLock {
            file: Some(file),
            path,
        })
    }
}

/// An exclusively held lock, released when dropped.
#[derive(Debug)]
pub struct SwarmLock {
    file: Option<File>,
    path: PathBuf,
}

impl SwarmLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and report whether unlocking succeeded.
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file).map_err(|source| Error::Lock {
                path: self.path.clone(),
                source,
            })?;
            swlog_debug!("released lock {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for SwarmLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            // Closing the file descriptor still drops the OS lock.
            swlog_warn!("{}", e);
        }
    }
}

/// Escape path-significant characters so distinct ids get distinct files.
fn escape_id(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            c => escaped.push(c),
        }
    }
    escaped
}
