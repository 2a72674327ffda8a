use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Repository error: {0}")]
    Repo(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Raw git failure, returned as-is so callers can read stdout/stderr.
    #[error(transparent)]
    Git(#[from] GitError),

    /// A mandatory git step failed.
    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: GitError,
    },

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("not on integration branch {expected} (HEAD is {actual})")]
    NotOnIntegrationBranch { expected: String, actual: String },

    #[error("swarm not found: {0}")]
    SwarmNotFound(String),

    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git executable not found: {0}")]
    GitNotInstalled(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn step(step: impl Into<String>, source: GitError) -> Self {
        Error::Step {
            step: step.into(),
            source,
        }
    }

    /// The raw git failure behind this error, wrapped or not.
    pub fn git_error(&self) -> Option<&GitError> {
        match self {
            Error::Git(err) | Error::Step { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
