//! In-memory remote provider.
//!
//! Holds a flat map of repository paths to file contents and a linear commit
//! history. Commits get ids `c1`, `c2`, ... and dates one minute apart
//! starting at [`EPOCH`](crate::git::EPOCH).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use gitsync_git::{
    ChangedFile, CommitRef, CommitRequest, CommitResponse, DirectoryEntry, Error, FileStatus,
    RemoteProvider, Result,
};

use crate::git::EPOCH;

#[derive(Debug, Clone)]
struct FakeCommit {
    commit: CommitRef,
    message: String,
    changes: Vec<ChangedFile>,
}

#[derive(Debug, Default)]
struct FakeState {
    files: BTreeMap<String, String>,
    commits: Vec<FakeCommit>,
    directory_requests: Vec<String>,
}

impl FakeState {
    fn apply(&mut self, message: &str, changes: &[(&str, Option<&str>)]) -> CommitRef {
        let mut changed = Vec::new();
        for (path, contents) in changes {
            let path = path.trim_matches('/').to_string();
            match contents {
                Some(text) => {
                    let status = if self.files.contains_key(&path) {
                        FileStatus::Modified
                    } else {
                        FileStatus::Added
                    };
                    self.files.insert(path.clone(), text.to_string());
                    changed.push(ChangedFile {
                        filename: path,
                        status,
                    });
                }
                None => {
                    if self.files.remove(&path).is_some() {
                        changed.push(ChangedFile {
                            filename: path,
                            status: FileStatus::Removed,
                        });
                    }
                }
            }
        }

        let n = self.commits.len() as i64 + 1;
        let commit = CommitRef {
            id: format!("c{n}"),
            date: Utc.timestamp_opt(EPOCH, 0).unwrap() + Duration::minutes(n),
        };
        self.commits.push(FakeCommit {
            commit: commit.clone(),
            message: message.to_string(),
            changes: changed,
        });
        commit
    }
}

/// In-memory [`RemoteProvider`] for engine tests
#[derive(Debug, Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
    unavailable: AtomicBool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with one initial commit containing `files`
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let provider = Self::new();
        let changes: Vec<(&str, Option<&str>)> =
            files.iter().map(|(p, c)| (*p, Some(*c))).collect();
        provider.push_commit(&changes);
        provider
    }

    /// Record a commit made by someone else
    pub fn push_commit(&self, changes: &[(&str, Option<&str>)]) -> CommitRef {
        self.lock().apply("remote change", changes)
    }

    /// Make every call fail as if the remote could not be reached
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn commits(&self) -> Vec<CommitRef> {
        self.lock().commits.iter().map(|c| c.commit.clone()).collect()
    }

    pub fn last_message(&self) -> Option<String> {
        self.lock().commits.last().map(|c| c.message.clone())
    }

    /// Paths passed to `get_directory`, in call order
    pub fn directory_requests(&self) -> Vec<String> {
        self.lock().directory_requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::unavailable("fake", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn get_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        self.check_available()?;
        let mut state = self.lock();
        let dir = path.trim_matches('/').to_string();
        state.directory_requests.push(dir.clone());

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let mut trees = BTreeSet::new();
        let mut entries = Vec::new();
        for (file, text) in &state.files {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    trees.insert(sub.to_string());
                }
                None => entries.push(DirectoryEntry::blob(rest, Some(text.clone()))),
            }
        }
        entries.extend(trees.into_iter().map(DirectoryEntry::tree));
        Ok(entries)
    }

    async fn get_last_commit(&self) -> Result<Option<CommitRef>> {
        self.check_available()?;
        Ok(self.lock().commits.last().map(|c| c.commit.clone()))
    }

    async fn get_commits_since(&self, since: DateTime<Utc>) -> Result<Vec<CommitRef>> {
        self.check_available()?;
        Ok(self
            .lock()
            .commits
            .iter()
            .filter(|c| c.commit.date > since)
            .map(|c| c.commit.clone())
            .collect())
    }

    async fn get_files_changed_in_commit(&self, id: &str) -> Result<Vec<ChangedFile>> {
        self.check_available()?;
        self.lock()
            .commits
            .iter()
            .find(|c| c.commit.id == id)
            .map(|c| c.changes.clone())
            .ok_or_else(|| Error::CommitNotFound { id: id.to_string() })
    }

    async fn commit_changes(&self, request: CommitRequest) -> Result<CommitResponse> {
        self.check_available()?;
        let mut state = self.lock();
        let tip = state.commits.last().map(|c| c.commit.id.clone());
        if tip != request.expected_commit_id {
            return Ok(CommitResponse::StaleData);
        }

        let mut changes: Vec<(&str, Option<&str>)> = request
            .additions
            .iter()
            .map(|a| (a.path.as_str(), Some(a.contents.as_str())))
            .collect();
        changes.extend(request.deletions.iter().map(|d| (d.path.as_str(), None)));

        let commit = state.apply(&request.message, &changes);
        Ok(CommitResponse::Success(commit))
    }
}
