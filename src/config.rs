use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::DEFAULT_LOCK_DIR;
use crate::retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_BASE_DELAY};
use crate::store::DEFAULT_STORE_DIR;
use crate::{swlog_debug, Error, Result};

/// Engine settings. Built once by the caller and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote used for push, fetch and remote branch deletion.
    pub remote: String,
    pub fetch_attempts: u32,
    pub fetch_base_delay_ms: u64,
    /// Overall bound on one fetch-with-retry, including sleeps.
    pub fetch_deadline_secs: Option<u64>,
    /// Kill any single git command running longer than this.
    pub command_timeout_secs: Option<u64>,
    /// Lock directory, relative to the repository root.
    pub lock_dir: String,
    /// Swarm store directory, relative to the repository root.
    pub store_dir: String,
    /// Serialize checkout-mutating operations across all swarms sharing this
    /// working tree.
    pub serialize_worktree: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            fetch_attempts: DEFAULT_ATTEMPTS,
            fetch_base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            fetch_deadline_secs: None,
            command_timeout_secs: None,
            lock_dir: DEFAULT_LOCK_DIR.to_string(),
            store_dir: DEFAULT_STORE_DIR.to_string(),
            serialize_worktree: true,
        }
    }
}

impl Config {
    pub fn swarm_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".swarm"))
    }

    pub fn user_config_path() -> Result<PathBuf> {
        Ok(Self::swarm_dir()?.join("swarm.toml"))
    }

    pub fn repo_config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(".swarm").join("config.toml")
    }

    /// Repository config, then user config, then defaults.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let repo_path = Self::repo_config_path(repo_root);
        if repo_path.exists() {
            return Self::load_from(&repo_path);
        }
        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }
        swlog_debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        swlog_debug!("Config::load_from path={}", path.display());
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        swlog_debug!(
            "Config loaded: remote={} fetch_attempts={} serialize_worktree={}",
            config.remote,
            config.fetch_attempts,
            config.serialize_worktree
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        swlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(Error::Validation("remote must not be empty".to_string()));
        }
        if self.fetch_attempts == 0 {
            return Err(Error::Validation(
                "fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.lock_dir.is_empty() || self.store_dir.is_empty() {
            return Err(Error::Validation(
                "lock_dir and store_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_attempts,
            Duration::from_millis(self.fetch_base_delay_ms),
        )
        .with_deadline(self.fetch_deadline_secs.map(Duration::from_secs))
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
