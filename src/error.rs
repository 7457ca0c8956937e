//! Error types for polycommit modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from configuration resolution and the persisted config document.
///
/// Every variant is fatal: the caller must fix its configuration before any
/// backend is contacted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config property {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Invalid config property: {0}")]
    UnknownKey(String),

    #[error("Only OLLAMA.model supports appending values, got '{0}'")]
    AppendUnsupported(String),

    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// The field named by a validation failure, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field),
            ConfigError::UnknownKey(key) | ConfigError::AppendUnsupported(key) => Some(key),
            ConfigError::Io { .. } | ConfigError::Parse { .. } => None,
        }
    }
}

/// Errors from a single backend call.
///
/// These never abort a generation run; the engine turns each one into an
/// error candidate.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend responded with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Backend returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Generation task stopped unexpectedly: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => BackendError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => BackendError::Transport(err.to_string()),
        }
    }
}

/// Errors from staged diff collection and committing.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("No staged changes found. Stage your changes manually, or use the --all flag")]
    NoChanges,

    #[error("Failed to collect diff: {0}")]
    DiffFailed(#[source] git2::Error),

    #[error("Failed to stage changes: {0}")]
    StagingFailed(#[source] git2::Error),

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),
}

/// Errors from the interactive candidate picker.
#[derive(Error, Debug)]
pub enum SelectError {
    #[error("No commit message could be generated; every backend failed")]
    NothingSelectable,

    #[error("Selection cancelled")]
    Cancelled,
}
