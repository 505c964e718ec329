//! Error types for gitsync-git

use std::path::PathBuf;

/// Result type for gitsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a remote provider.
///
/// Every variant means the provider could not be used for the current
/// operation; none of them is retried here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found at {path}")]
    RepositoryNotFound { path: PathBuf },

    #[error("Commit '{id}' not found")]
    CommitNotFound { id: String },

    #[error("Invalid repository path: {path}")]
    InvalidPath { path: String },

    #[error("Provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Provider task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
