//! Real git repository fixtures with deterministic history.
//!
//! Commits are written straight to the object database with fixed author
//! times, so "commits since" queries in tests never depend on the wall clock.

use std::path::Path;

use git2::{Commit, Index, IndexEntry, IndexTime, Oid, Repository, Signature, Time};

/// Base timestamp for fixture commits (2024-01-01T00:00:00Z)
pub const EPOCH: i64 = 1_704_067_200;

/// Initialises an empty git repository using `git2`.
///
/// # Panics
/// Panics if `git2::Repository::init` fails.
pub fn init_repo(path: &Path) -> Repository {
    Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "init_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

/// Commits on top of `HEAD` at `EPOCH + offset` seconds.
///
/// Each `(path, contents)` pair writes `contents` to `path`, or deletes
/// `path` when `contents` is `None`.
///
/// # Panics
/// Panics if any git operation fails.
pub fn commit_at(repo: &Repository, offset: i64, files: &[(&str, Option<&str>)]) -> Oid {
    let parent: Option<Commit<'_>> = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    let mut index = Index::new().unwrap_or_else(|e| panic!("commit_at: index: {e}"));
    if let Some(p) = &parent {
        let tree = p.tree().unwrap_or_else(|e| panic!("commit_at: parent tree: {e}"));
        index
            .read_tree(&tree)
            .unwrap_or_else(|e| panic!("commit_at: read tree: {e}"));
    }

    for (path, contents) in files {
        match contents {
            Some(text) => {
                let id = repo
                    .blob(text.as_bytes())
                    .unwrap_or_else(|e| panic!("commit_at: blob for {path}: {e}"));
                index
                    .add(&IndexEntry {
                        ctime: IndexTime::new(0, 0),
                        mtime: IndexTime::new(0, 0),
                        dev: 0,
                        ino: 0,
                        mode: 0o100644,
                        uid: 0,
                        gid: 0,
                        file_size: text.len() as u32,
                        id,
                        flags: path.len() as u16,
                        flags_extended: 0,
                        path: path.as_bytes().to_vec(),
                    })
                    .unwrap_or_else(|e| panic!("commit_at: add {path}: {e}"));
            }
            None => index
                .remove_path(Path::new(path))
                .unwrap_or_else(|e| panic!("commit_at: remove {path}: {e}")),
        }
    }

    let tree_id = index
        .write_tree_to(repo)
        .unwrap_or_else(|e| panic!("commit_at: write tree: {e}"));
    let tree = repo
        .find_tree(tree_id)
        .unwrap_or_else(|e| panic!("commit_at: find tree: {e}"));
    let sig = Signature::new("Test User", "test@test.com", &Time::new(EPOCH + offset, 0))
        .unwrap_or_else(|e| panic!("commit_at: signature: {e}"));
    let parents: Vec<&Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, "fixture commit", &tree, &parents)
        .unwrap_or_else(|e| panic!("commit_at: commit: {e}"))
}

/// Initialises a repository with one commit at `EPOCH` containing `files`.
///
/// # Panics
/// Panics if any git operation fails.
pub fn repo_with_files(path: &Path, files: &[(&str, &str)]) -> Repository {
    let repo = init_repo(path);
    let entries: Vec<(&str, Option<&str>)> = files.iter().map(|(p, c)| (*p, Some(*c))).collect();
    commit_at(&repo, 0, &entries);
    repo
}
