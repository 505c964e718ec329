//! Error types for gitsync-core

use std::path::PathBuf;

/// Result type for gitsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync operations.
///
/// Stale commits and conflicts are not errors: they are reported as data by
/// [`CommitOutcome`](crate::CommitOutcome) and
/// [`ApplyPullReport`](crate::ApplyPullReport).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No sync configuration for the workspace
    #[error("No sync configuration for workspace '{workspace}'")]
    ConfigNotFound { workspace: String },

    /// Initial sync requested on a configuration that already synced
    #[error("Workspace '{workspace}' already synced at commit {commit}")]
    AlreadySynced { workspace: String, commit: String },

    /// Pull or commit requested before an initial sync
    #[error("Workspace '{workspace}' has not completed an initial sync")]
    NotSynced { workspace: String },

    /// The remote branch has no commits
    #[error("Remote '{provider}' has no commits")]
    NoCommits { provider: String },

    /// A referenced entity is missing from the store
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid rank '{rank}': {reason}")]
    InvalidRank { rank: String, reason: String },

    #[error("Invalid match pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid workspace id: {id}")]
    InvalidWorkspace { id: String },

    #[error("Failed to parse settings at {path}: {message}")]
    SettingsParse { path: PathBuf, message: String },

    #[error("Unsupported settings format: {extension}")]
    UnsupportedSettingsFormat { extension: String },

    /// Content transcoding failed
    #[error(transparent)]
    Content(#[from] gitsync_content::Error),

    /// The remote provider could not be used
    #[error(transparent)]
    Provider(#[from] gitsync_git::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
