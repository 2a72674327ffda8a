//! Swarm stores.
//!
//! The engine reads swarms through [`SwarmStore`] and nothing else. The
//! store owns task status and dependency edges; the engine only reads them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::core::{Swarm, TaskId, TaskStatus};
use crate::{swlog_debug, Error, Result};

/// Store directory name, relative to the repository root.
pub const DEFAULT_STORE_DIR: &str = ".swarm/swarms";

/// Read interface to the external dependency store.
pub trait SwarmStore: Send + Sync {
    /// Load a swarm, failing with [`Error::SwarmNotFound`] if it doesn't exist.
    fn load_swarm(&self, swarm_id: &str) -> Result<Swarm>;
}

/// One pretty-printed `<id>.json` file per swarm.
#[derive(Debug, Clone)]
pub struct JsonSwarmStore {
    dir: PathBuf,
}

impl JsonSwarmStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_repo(repo_root: &Path, store_dir: &str) -> Self {
        Self::new(repo_root.join(store_dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, swarm_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", swarm_id))
    }

    pub fn save_swarm(&self, swarm: &Swarm) -> Result<()> {
        swarm.validate()?;
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(&swarm.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(swarm)?)?;
        fs::rename(&tmp, &path)?;
        swlog_debug!("saved swarm {} to {}", swarm.id, path.display());
        Ok(())
    }

    /// Record a status change made by the issue tracker or an operator.
    pub fn set_task_status(&self, swarm_id: &str, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        let mut swarm = self.load_swarm(swarm_id)?;
        set_status(&mut swarm, task_id, status)?;
        self.save_swarm(&swarm)
    }

    /// Ids of every stored swarm, sorted.
    pub fn list_swarms(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl SwarmStore for JsonSwarmStore {
    fn load_swarm(&self, swarm_id: &str) -> Result<Swarm> {
        if swarm_id.is_empty() || swarm_id.contains('/') {
            return Err(Error::SwarmNotFound(swarm_id.to_string()));
        }
        let path = self.path_for(swarm_id);
        if !path.exists() {
            return Err(Error::SwarmNotFound(swarm_id.to_string()));
        }
        let swarm: Swarm = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if swarm.id != swarm_id {
            return Err(Error::Validation(format!(
                "{} holds swarm {}, expected {}",
                path.display(),
                swarm.id,
                swarm_id
            )));
        }
        swarm.validate()?;
        Ok(swarm)
    }
}

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    swarms: RwLock<HashMap<String, Swarm>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, swarm: Swarm) -> Result<()> {
        swarm.validate()?;
        self.swarms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(swarm.id.clone(), swarm);
        Ok(())
    }

    pub fn set_task_status(&self, swarm_id: &str, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        let mut swarms = self.swarms.write().unwrap_or_else(PoisonError::into_inner);
        let swarm = swarms
            .get_mut(swarm_id)
            .ok_or_else(|| Error::SwarmNotFound(swarm_id.to_string()))?;
        set_status(swarm, task_id, status)
    }
}

impl SwarmStore for MemoryStore {
    fn load_swarm(&self, swarm_id: &str) -> Result<Swarm> {
        self.swarms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(swarm_id)
            .cloned()
            .ok_or_else(|| Error::SwarmNotFound(swarm_id.to_string()))
    }
}

fn set_status(swarm: &mut Swarm, task_id: &TaskId, status: TaskStatus) -> Result<()> {
    let swarm_id = swarm.id.clone();
    let task = swarm.task_mut(task_id).ok_or_else(|| {
        Error::Validation(format!("swarm {} has no task {}", swarm_id, task_id))
    })?;
    task.status = status;
    Ok(())
}
