//! First import of a remote directory into the workspace

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use gitsync_content::decode_all;
use gitsync_git::{CommitRef, EntryKind, RemoteProvider};
use serde::Serialize;
use tracing::{info, warn};

use super::SyncEngine;
use super::plan::Planner;
use crate::model::GitRecord;
use crate::paths::{self, MatchPattern, PathKind};
use crate::{Error, Result};

/// A remote directory with its matching files and subdirectories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteTree {
    /// Path relative to the base directory, empty for the base itself
    pub path: String,
    pub files: Vec<RemoteFile>,
    pub directories: Vec<RemoteTree>,
}

impl RemoteTree {
    /// This tree and every subtree, parents before children
    pub fn walk(&self) -> Vec<&RemoteTree> {
        let mut out = vec![self];
        for child in &self.directories {
            out.extend(child.walk());
        }
        out
    }

    pub fn file_count(&self) -> usize {
        self.walk().iter().map(|tree| tree.files.len()).sum()
    }
}

/// A matching file, path relative to the base directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    pub path: String,
    pub text: String,
}

/// Recursively list `path` under `base`, keeping files that match `pattern`.
///
/// Subdirectories of one directory are listed concurrently.
pub fn fetch_tree<'a>(
    provider: &'a dyn RemoteProvider,
    base: &'a str,
    path: String,
    pattern: &'a MatchPattern,
) -> BoxFuture<'a, Result<RemoteTree>> {
    async move {
        let entries = provider.get_directory(&paths::join(base, &path)).await?;

        let mut files = Vec::new();
        let mut subdirectories = Vec::new();
        for entry in entries {
            let child = paths::join(&path, &entry.name);
            match entry.kind {
                EntryKind::Tree => subdirectories.push(child),
                EntryKind::Blob if pattern.matches(&child) => match entry.text {
                    Some(text) => files.push(RemoteFile { path: child, text }),
                    None => warn!(path = %child, "Skipping file without text content"),
                },
                EntryKind::Blob => {}
            }
        }

        let directories = try_join_all(
            subdirectories
                .into_iter()
                .map(|dir| fetch_tree(provider, base, dir, pattern)),
        )
        .await?;

        Ok(RemoteTree {
            path,
            files,
            directories,
        })
    }
    .boxed()
}

/// Counts of what an initial sync created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitialSyncReport {
    pub directories: usize,
    pub pieces: usize,
    pub variants: usize,
    pub records: usize,
    pub skipped: usize,
    pub commit: CommitRef,
}

impl SyncEngine {
    /// Import every matching file under the base directory.
    ///
    /// Creates one content group per directory, one content piece per base
    /// file and one variant rendition per variant file, then records the
    /// remote tip as the sync high-water mark. Fails without writing when the
    /// remote has no commits.
    pub async fn initial_sync(&self) -> Result<InitialSyncReport> {
        let (snapshot, context) = self.load().await?;
        if let Some(commit) = &context.config.last_commit_id {
            return Err(Error::AlreadySynced {
                workspace: self.workspace.clone(),
                commit: commit.clone(),
            });
        }

        let commit = self
            .provider
            .get_last_commit()
            .await?
            .ok_or_else(|| Error::NoCommits {
                provider: self.provider.name().to_string(),
            })?;

        info!(
            workspace = %self.workspace,
            base = %context.base,
            commit = %commit.id,
            "Starting initial sync"
        );

        let tree = fetch_tree(
            self.provider.as_ref(),
            &context.base,
            String::new(),
            &context.pattern,
        )
        .await?;

        let mut planner = Planner::new(&snapshot, &context.base);
        for dir in tree.walk() {
            planner.ensure_directory(&context.mapper.canonical_directory(&dir.path))?;
        }

        let mut base_files = Vec::new();
        let mut variant_files = Vec::new();
        for file in tree.walk().into_iter().flat_map(|dir| &dir.files) {
            match context.mapper.classify(&file.path) {
                PathKind::Base { path } => base_files.push((file, path)),
                PathKind::Variant { key, path } => variant_files.push((file, key, path)),
            }
        }

        let texts: Vec<String> = base_files.iter().map(|(f, _)| f.text.clone()).collect();
        let decoded = decode_all(context.transcoder.as_ref(), &texts).await?;

        let mut pieces_by_path = HashMap::new();
        for ((file, canonical), decoded) in base_files.iter().zip(&decoded) {
            let group_id = planner.ensure_directory(paths::parent(canonical))?;
            let piece_id = planner.create_piece(&group_id, &file.path, decoded);
            planner.batch.records.upsert(GitRecord::synced(
                file.path.clone(),
                piece_id.clone(),
                None,
                decoded.hash.clone(),
            ));
            pieces_by_path.insert(canonical.clone(), piece_id);
        }

        let texts: Vec<String> = variant_files.iter().map(|(f, _, _)| f.text.clone()).collect();
        let decoded = decode_all(context.transcoder.as_ref(), &texts).await?;

        let mut skipped = 0;
        let mut variant_count = 0;
        for ((file, key, canonical), decoded) in variant_files.iter().zip(&decoded) {
            let Some(piece_id) = pieces_by_path.get(canonical) else {
                warn!(path = %file.path, variant = %key, "Skipping variant file without a base file");
                skipped += 1;
                continue;
            };
            let variant_id = planner.ensure_variant(key);
            planner.upsert_variant_content(piece_id, &variant_id, decoded);
            planner.batch.records.upsert(GitRecord::synced(
                file.path.clone(),
                piece_id.clone(),
                Some(variant_id),
                decoded.hash.clone(),
            ));
            variant_count += 1;
        }

        let mut batch = planner.finish();
        let mut config = context.config;
        config.last_commit_id = Some(commit.id.clone());
        config.last_commit_date = Some(commit.date);
        batch.config = Some(config);

        let report = InitialSyncReport {
            directories: batch.directories.upserts.len(),
            pieces: batch.pieces.upserts.len(),
            variants: variant_count,
            records: batch.records.upserts.len(),
            skipped,
            commit,
        };
        self.store.write(&self.workspace, batch).await?;

        info!(
            workspace = %self.workspace,
            directories = report.directories,
            pieces = report.pieces,
            variants = report.variants,
            "Initial sync complete"
        );
        Ok(report)
    }
}
