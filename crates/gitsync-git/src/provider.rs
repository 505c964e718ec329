//! Remote provider contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Tree,
    Blob,
}

/// One immediate child of a remote directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Decoded text of a blob, when available
    pub text: Option<String>,
}

impl DirectoryEntry {
    pub fn tree(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Tree,
            text: None,
        }
    }

    pub fn blob(name: impl Into<String>, text: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Blob,
            text,
        }
    }
}

/// Identity and timestamp of a remote commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub id: String,
    pub date: DateTime<Utc>,
}

/// How a commit touched a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
}

/// A file touched by a commit, with its repository-relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
}

/// A file to create or overwrite, path relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAddition {
    pub path: String,
    pub contents: String,
}

/// A file to delete, path relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeletion {
    pub path: String,
}

/// An atomic commit request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub message: String,
    pub additions: Vec<FileAddition>,
    pub deletions: Vec<FileDeletion>,
    /// Tip the caller last observed; `None` for a repository without commits
    pub expected_commit_id: Option<String>,
}

/// Outcome of [`RemoteProvider::commit_changes`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CommitResponse {
    Success(CommitRef),
    /// The branch tip no longer matches the expected commit
    StaleData,
}

/// Access to a remote repository.
///
/// Instances are constructed per sync operation and passed to the engine;
/// no process-wide client is shared.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Provider name, for logging
    fn name(&self) -> &str;

    /// List the immediate children of a directory at the branch tip.
    ///
    /// `""` is the repository root. A directory that does not exist lists as
    /// empty.
    async fn get_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>>;

    /// The branch tip, or `None` when the branch has no commits
    async fn get_last_commit(&self) -> Result<Option<CommitRef>>;

    /// Commits strictly newer than `since`, oldest first
    async fn get_commits_since(&self, since: DateTime<Utc>) -> Result<Vec<CommitRef>>;

    /// Files changed by one commit relative to its first parent
    async fn get_files_changed_in_commit(&self, id: &str) -> Result<Vec<ChangedFile>>;

    /// Create one commit on the branch if its tip equals
    /// `request.expected_commit_id`
    async fn commit_changes(&self, request: CommitRequest) -> Result<CommitResponse>;
}
