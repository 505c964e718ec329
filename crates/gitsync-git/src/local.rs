//! Provider over a git repository on disk
//!
//! Reads and commits go straight to the object database and the branch that
//! `HEAD` points at. The working tree and the on-disk index are never
//! touched, so bare repositories work the same as checkouts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use git2::{
    Commit, Delta, DiffOptions, ErrorCode, Index, IndexEntry, IndexTime, ObjectType, Oid,
    Repository, Signature, Sort, Time,
};
use tokio::sync::Mutex;

use crate::provider::{
    ChangedFile, CommitRef, CommitRequest, CommitResponse, DirectoryEntry, FileStatus,
    RemoteProvider,
};
use crate::{Error, Result};

const DEFAULT_AUTHOR_NAME: &str = "gitsync";
const DEFAULT_AUTHOR_EMAIL: &str = "gitsync@localhost";

/// [`RemoteProvider`] backed by a local git repository
#[derive(Debug, Clone)]
pub struct LocalGitProvider {
    path: PathBuf,
    author_name: String,
    author_email: String,
    /// Serializes commits so the tip check and ref update are one step
    commit_lock: Arc<Mutex<()>>,
}

impl LocalGitProvider {
    /// Create a provider for the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryNotFound` if no repository can be opened there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Repository::open(&path).map_err(|_| Error::RepositoryNotFound { path: path.clone() })?;
        Ok(Self {
            path,
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Set the author and committer identity used for new commits
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking git operation on a freshly opened repository
    async fn with_repo<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path)
                .map_err(|_| Error::RepositoryNotFound { path: path.clone() })?;
            op(&repo)
        })
        .await?
    }
}

/// The commit `HEAD` points at, or `None` on an unborn branch
fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn commit_date(commit: &Commit<'_>) -> DateTime<Utc> {
    Utc.timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_default()
}

fn commit_ref(commit: &Commit<'_>) -> CommitRef {
    CommitRef {
        id: commit.id().to_string(),
        date: commit_date(commit),
    }
}

/// Normalize a repository path: forward slashes, no leading/trailing slash
fn clean_path(path: &str) -> Result<String> {
    let cleaned = path.replace('\\', "/");
    let cleaned = cleaned.trim_matches('/');
    if cleaned.split('/').any(|seg| seg == ".." || seg == ".") {
        return Err(Error::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(cleaned.to_string())
}

fn list_directory(repo: &Repository, path: &str) -> Result<Vec<DirectoryEntry>> {
    let Some(commit) = head_commit(repo)? else {
        return Ok(Vec::new());
    };
    let root = commit.tree()?;
    let tree = if path.is_empty() {
        root
    } else {
        match root.get_path(Path::new(path)) {
            Ok(entry) if entry.kind() == Some(ObjectType::Tree) => {
                entry.to_object(repo)?.peel_to_tree()?
            }
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }
    };

    let mut entries = Vec::with_capacity(tree.len());
    for entry in tree.iter() {
        let Some(name) = entry.name() else {
            tracing::warn!(path = %path, "Skipping entry with non UTF-8 name");
            continue;
        };
        match entry.kind() {
            Some(ObjectType::Tree) => entries.push(DirectoryEntry::tree(name)),
            Some(ObjectType::Blob) => {
                let blob = repo.find_blob(entry.id())?;
                let text = std::str::from_utf8(blob.content()).ok().map(String::from);
                entries.push(DirectoryEntry::blob(name, text));
            }
            // submodules
            _ => {}
        }
    }
    Ok(entries)
}

fn changed_files(repo: &Repository, id: &str) -> Result<Vec<ChangedFile>> {
    let oid = Oid::from_str(id).map_err(|_| Error::CommitNotFound { id: id.to_string() })?;
    let commit = repo
        .find_commit(oid)
        .map_err(|_| Error::CommitNotFound { id: id.to_string() })?;
    let tree = commit.tree()?;
    let parent_tree = match commit.parents().next() {
        Some(parent) => Some(parent.tree()?),
        None => None,
    };

    let mut opts = DiffOptions::new();
    opts.include_typechange(true);
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

    let path_of = |file: git2::DiffFile<'_>| {
        file.path()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    };

    let mut files = Vec::new();
    for delta in diff.deltas() {
        match delta.status() {
            Delta::Added | Delta::Copied => {
                if let Some(filename) = path_of(delta.new_file()) {
                    files.push(ChangedFile {
                        filename,
                        status: FileStatus::Added,
                    });
                }
            }
            Delta::Deleted => {
                if let Some(filename) = path_of(delta.old_file()) {
                    files.push(ChangedFile {
                        filename,
                        status: FileStatus::Removed,
                    });
                }
            }
            Delta::Renamed => {
                if let Some(filename) = path_of(delta.old_file()) {
                    files.push(ChangedFile {
                        filename,
                        status: FileStatus::Removed,
                    });
                }
                if let Some(filename) = path_of(delta.new_file()) {
                    files.push(ChangedFile {
                        filename,
                        status: FileStatus::Added,
                    });
                }
            }
            Delta::Modified | Delta::Typechange => {
                if let Some(filename) = path_of(delta.new_file()) {
                    files.push(ChangedFile {
                        filename,
                        status: FileStatus::Modified,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(files)
}

fn blob_entry(path: &str, id: Oid, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: u32::try_from(size).unwrap_or(u32::MAX),
        id,
        flags: u16::try_from(path.len()).unwrap_or(0xfff).min(0xfff),
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

fn create_commit(
    repo: &Repository,
    request: &CommitRequest,
    author_name: &str,
    author_email: &str,
) -> Result<CommitResponse> {
    let parent = head_commit(repo)?;
    let tip = parent.as_ref().map(|c| c.id().to_string());
    if tip != request.expected_commit_id {
        tracing::info!(
            expected = ?request.expected_commit_id,
            actual = ?tip,
            "Rejecting commit on stale tip"
        );
        return Ok(CommitResponse::StaleData);
    }

    let mut index = Index::new()?;
    if let Some(parent) = &parent {
        index.read_tree(&parent.tree()?)?;
    }

    for addition in &request.additions {
        let path = clean_path(&addition.path)?;
        let oid = repo.blob(addition.contents.as_bytes())?;
        index.add(&blob_entry(&path, oid, addition.contents.len()))?;
    }
    for deletion in &request.deletions {
        let path = clean_path(&deletion.path)?;
        if index.get_path(Path::new(&path), 0).is_some() {
            index.remove_path(Path::new(&path))?;
        }
    }

    let tree_id = index.write_tree_to(repo)?;
    let tree = repo.find_tree(tree_id)?;

    // Keep commit times strictly increasing so "commits since" never misses one
    let now = Utc::now().timestamp();
    let seconds = match &parent {
        Some(p) => now.max(p.time().seconds() + 1),
        None => now,
    };
    let signature = Signature::new(author_name, author_email, &Time::new(seconds, 0))?;

    let parents: Vec<&Commit<'_>> = parent.iter().collect();
    let oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &request.message,
        &tree,
        &parents,
    )?;
    let commit = repo.find_commit(oid)?;

    tracing::info!(
        commit = %oid,
        additions = request.additions.len(),
        deletions = request.deletions.len(),
        "Created commit"
    );
    Ok(CommitResponse::Success(commit_ref(&commit)))
}

#[async_trait]
impl RemoteProvider for LocalGitProvider {
    fn name(&self) -> &str {
        "local-git"
    }

    async fn get_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let path = clean_path(path)?;
        self.with_repo(move |repo| list_directory(repo, &path)).await
    }

    async fn get_last_commit(&self) -> Result<Option<CommitRef>> {
        self.with_repo(|repo| Ok(head_commit(repo)?.as_ref().map(commit_ref)))
            .await
    }

    async fn get_commits_since(&self, since: DateTime<Utc>) -> Result<Vec<CommitRef>> {
        self.with_repo(move |repo| {
            if head_commit(repo)?.is_none() {
                return Ok(Vec::new());
            }
            let mut revwalk = repo.revwalk()?;
            revwalk.push_head()?;
            revwalk.set_sorting(Sort::TIME | Sort::REVERSE)?;

            let mut commits = Vec::new();
            for oid in revwalk {
                let commit = repo.find_commit(oid?)?;
                if commit_date(&commit) > since {
                    commits.push(commit_ref(&commit));
                }
            }
            Ok(commits)
        })
        .await
    }

    async fn get_files_changed_in_commit(&self, id: &str) -> Result<Vec<ChangedFile>> {
        let id = id.to_string();
        self.with_repo(move |repo| changed_files(repo, &id)).await
    }

    async fn commit_changes(&self, request: CommitRequest) -> Result<CommitResponse> {
        let _guard = self.commit_lock.lock().await;
        let name = self.author_name.clone();
        let email = self.author_email.clone();
        self.with_repo(move |repo| create_commit(repo, &request, &name, &email))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_strips_slashes() {
        assert_eq!(clean_path("/docs/a.md/").unwrap(), "docs/a.md");
        assert_eq!(clean_path("docs\\a.md").unwrap(), "docs/a.md");
        assert_eq!(clean_path("").unwrap(), "");
    }

    #[test]
    fn clean_path_rejects_traversal() {
        assert!(matches!(
            clean_path("docs/../secret"),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn open_missing_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalGitProvider::open(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::RepositoryNotFound { .. })));
    }
}
