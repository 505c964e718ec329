//! Bringing remote commits into the workspace

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use gitsync_content::{content_hash, decode_all};
use gitsync_git::{CommitRef, EntryKind, FileStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::plan::Planner;
use super::{SyncContext, SyncEngine};
use crate::model::{Conflict, GitRecord};
use crate::paths::{self, PathKind};
use crate::store::{WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

/// A remote file changed since the last sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedRecord {
    /// Path relative to the base directory
    pub path: String,
    pub status: FileStatus,
    /// Current remote text, `None` for removed files
    pub content: Option<String>,
    pub hash: Option<String>,
}

/// Net remote changes since the last sync, grouped by base-relative directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    pub changed_records_by_directory: BTreeMap<String, Vec<ChangedRecord>>,
    /// Newest commit seen, `None` when the remote had nothing new
    pub last_commit: Option<CommitRef>,
    /// Date the commits were queried from
    pub since: DateTime<Utc>,
}

impl PullResult {
    pub fn records(&self) -> impl Iterator<Item = &ChangedRecord> {
        self.changed_records_by_directory.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.records().next().is_none()
    }
}

/// What applying a pull did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyPullReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Files changed on both sides, left untouched locally
    pub conflicts: Vec<Conflict>,
}

impl ApplyPullReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

enum Action<'a> {
    Create(&'a ChangedRecord, &'a str),
    Update(&'a ChangedRecord, &'a str, &'a GitRecord),
    Delete(&'a GitRecord),
    Conflict(Conflict),
    Unchanged,
    Skip,
}

/// Decide what a changed remote file means for its local record.
///
/// A conflict exists when both sides moved away from the synced hash. A
/// remote removal of a base file also conflicts while another rendition of its
/// piece has local edits.
fn decide<'a>(snapshot: &'a WorkspaceSnapshot, change: &'a ChangedRecord) -> Action<'a> {
    let record = snapshot.records.get(&change.path);
    match (record, change.status, change.content.as_deref()) {
        (None, FileStatus::Removed, _) => Action::Skip,
        (None, _, Some(text)) => Action::Create(change, text),
        (None, _, None) => Action::Skip,
        (Some(record), FileStatus::Removed, _) => {
            if record.is_new_locally() && !record.is_deleted_locally() {
                // Never committed, so the remote removal is not a divergence
                Action::Skip
            } else if (record.has_local_changes() && !record.is_deleted_locally())
                || has_edited_renditions(snapshot, record)
            {
                Action::Conflict(conflict(record, String::new(), String::new()))
            } else {
                Action::Delete(record)
            }
        }
        (Some(record), _, Some(text)) => {
            let pulled = change
                .hash
                .clone()
                .unwrap_or_else(|| content_hash(text));
            if pulled == record.synced_hash && !record.has_local_changes() {
                Action::Unchanged
            } else if pulled != record.synced_hash && record.has_local_changes() {
                Action::Conflict(conflict(record, text.to_string(), pulled))
            } else {
                Action::Update(change, text, record)
            }
        }
        (Some(_), _, None) => Action::Skip,
    }
}

/// Whether deleting the piece behind a base record would drop local edits of
/// its variant renditions
fn has_edited_renditions(snapshot: &WorkspaceSnapshot, base: &GitRecord) -> bool {
    base.variant_id.is_none()
        && snapshot.records.values().any(|other| {
            other.content_piece_id == base.content_piece_id
                && other.path != base.path
                && other.has_local_changes()
                && !other.is_deleted_locally()
        })
}

/// Decide every change of a pull.
///
/// A base deletion whose piece has a conflicted rendition in the same pull
/// becomes a conflict too, so conflicted records are never cascaded away.
fn decide_all<'a>(
    snapshot: &'a WorkspaceSnapshot,
    result: &'a PullResult,
) -> Vec<(&'a ChangedRecord, Action<'a>)> {
    let decisions: Vec<_> = result
        .records()
        .map(|change| (change, decide(snapshot, change)))
        .collect();
    let conflicted: HashSet<String> = decisions
        .iter()
        .filter_map(|(_, action)| match action {
            Action::Conflict(conflict) => Some(conflict.content_piece_id.clone()),
            _ => None,
        })
        .collect();

    decisions
        .into_iter()
        .map(|(change, action)| match action {
            Action::Delete(record)
                if record.variant_id.is_none()
                    && conflicted.contains(&record.content_piece_id) =>
            {
                (
                    change,
                    Action::Conflict(conflict(record, String::new(), String::new())),
                )
            }
            action => (change, action),
        })
        .collect()
}

fn conflict(record: &GitRecord, pulled_content: String, pulled_hash: String) -> Conflict {
    Conflict {
        path: record.path.clone(),
        content_piece_id: record.content_piece_id.clone(),
        variant_id: record.variant_id.clone(),
        pulled_content,
        pulled_hash,
    }
}

impl SyncEngine {
    /// Collect remote changes since the last sync without touching the store.
    ///
    /// Each file keeps the status of the latest commit that touched it. Only
    /// directories with at least one added or modified file are listed, once
    /// each; files the listing does not return with text are left out.
    pub async fn pull(&self) -> Result<PullResult> {
        let (_, context) = self.load().await?;
        let since = context
            .config
            .last_commit_date
            .filter(|_| context.config.is_synced())
            .ok_or_else(|| self.not_synced())?;

        let commits = self.provider.get_commits_since(since).await?;
        let changes = try_join_all(
            commits
                .iter()
                .map(|commit| self.provider.get_files_changed_in_commit(&commit.id)),
        )
        .await?;

        let mut latest: BTreeMap<String, FileStatus> = BTreeMap::new();
        for file in changes.into_iter().flatten() {
            let Some(path) = paths::relative_to(&context.base, &file.filename) else {
                continue;
            };
            if context.pattern.matches(&path) {
                latest.insert(path, file.status);
            }
        }

        let mut by_directory: BTreeMap<String, Vec<(String, FileStatus)>> = BTreeMap::new();
        for (path, status) in latest {
            by_directory
                .entry(paths::parent(&path).to_string())
                .or_default()
                .push((path, status));
        }

        let to_list: Vec<&String> = by_directory
            .iter()
            .filter(|(_, files)| files.iter().any(|(_, s)| *s != FileStatus::Removed))
            .map(|(dir, _)| dir)
            .collect();
        let base = context.base.as_str();
        let provider = self.provider.as_ref();
        let listings = try_join_all(to_list.into_iter().map(|dir| async move {
            let entries = provider.get_directory(&paths::join(base, dir)).await?;
            Ok::<_, Error>((dir.clone(), entries))
        }))
        .await?;
        let listings: HashMap<String, _> = listings.into_iter().collect();

        let mut changed_records_by_directory = BTreeMap::new();
        for (dir, files) in by_directory {
            let mut records = Vec::new();
            for (path, status) in files {
                if status == FileStatus::Removed {
                    records.push(ChangedRecord {
                        path,
                        status,
                        content: None,
                        hash: None,
                    });
                    continue;
                }

                let name = paths::file_name(&path);
                let text = listings.get(&dir).and_then(|entries| {
                    entries
                        .iter()
                        .find(|e| e.kind == EntryKind::Blob && e.name == name)
                        .and_then(|e| e.text.clone())
                });
                match text {
                    Some(text) => records.push(ChangedRecord {
                        hash: Some(content_hash(&text)),
                        path,
                        status,
                        content: Some(text),
                    }),
                    None => warn!(path = %path, "Changed file missing from directory listing"),
                }
            }
            if !records.is_empty() {
                changed_records_by_directory.insert(dir, records);
            }
        }

        let result = PullResult {
            changed_records_by_directory,
            last_commit: commits.last().cloned(),
            since,
        };
        info!(
            workspace = %self.workspace,
            commits = commits.len(),
            files = result.records().count(),
            "Pulled remote changes"
        );
        Ok(result)
    }

    /// Conflicts `result` would produce, without changing anything
    pub async fn detect_conflicts(&self, result: &PullResult) -> Result<Vec<Conflict>> {
        let snapshot = self.store.load(&self.workspace).await?;
        Ok(decide_all(&snapshot, result)
            .into_iter()
            .filter_map(|(_, action)| match action {
                Action::Conflict(conflict) => Some(conflict),
                _ => None,
            })
            .collect())
    }

    /// Apply a pull result.
    ///
    /// Non-conflicting changes overwrite local content and records; conflicts
    /// are reported and leave their records untouched. The configuration is
    /// advanced to the pulled commit in the same batch, written last.
    pub async fn apply_pull(&self, result: &PullResult) -> Result<ApplyPullReport> {
        let (snapshot, context) = self.load().await?;
        let (mut batch, report) = self.plan_pull(&snapshot, &context, result).await?;

        let mut config = context.config;
        match &result.last_commit {
            Some(commit) => {
                config.last_commit_id = Some(commit.id.clone());
                config.last_commit_date = Some(commit.date);
            }
            None => config.last_commit_date = Some(result.since),
        }
        batch.config = Some(config);
        self.store.write(&self.workspace, batch).await?;

        info!(
            workspace = %self.workspace,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            conflicts = report.conflicts.len(),
            "Applied pull"
        );
        Ok(report)
    }

    async fn plan_pull(
        &self,
        snapshot: &WorkspaceSnapshot,
        context: &SyncContext,
        result: &PullResult,
    ) -> Result<(WriteBatch, ApplyPullReport)> {
        let mut report = ApplyPullReport::default();
        let mut writes = Vec::new();
        let mut deletes = Vec::new();

        for (change, action) in decide_all(snapshot, result) {
            match action {
                Action::Create(change, text) => writes.push((change, text, None)),
                Action::Update(change, text, record) => writes.push((change, text, Some(record))),
                Action::Delete(record) => deletes.push(record),
                Action::Conflict(conflict) => {
                    warn!(path = %conflict.path, "Conflict: changed locally and remotely");
                    report.conflicts.push(conflict);
                }
                Action::Unchanged => report.unchanged += 1,
                Action::Skip => {
                    debug!(path = %change.path, "Nothing to apply");
                    report.skipped += 1;
                }
            }
        }

        // Base files first so new variant files can find their base piece
        let mut writes: Vec<_> = writes
            .into_iter()
            .map(|(change, text, record)| (context.mapper.classify(&change.path), change, text, record))
            .collect();
        writes.sort_by_key(|(kind, change, _, _)| (kind.variant_key().is_some(), change.path.clone()));

        let texts: Vec<String> = writes.iter().map(|(_, _, text, _)| text.to_string()).collect();
        let decoded = decode_all(context.transcoder.as_ref(), &texts).await?;

        let mut planner = Planner::new(snapshot, &context.base);
        let mut created_pieces: HashMap<String, String> = HashMap::new();

        for ((kind, change, _, record), decoded) in writes.iter().zip(&decoded) {
            match (kind, record) {
                (PathKind::Base { path: canonical }, None) => {
                    let group_id = planner.ensure_directory(paths::parent(canonical))?;
                    let piece_id = planner.create_piece(&group_id, &change.path, decoded);
                    planner.batch.records.upsert(GitRecord::synced(
                        change.path.clone(),
                        piece_id.clone(),
                        None,
                        decoded.hash.clone(),
                    ));
                    created_pieces.insert(canonical.clone(), piece_id);
                    report.created += 1;
                }
                (PathKind::Variant { key, path: canonical }, None) => {
                    let base_path = context.mapper.concrete(canonical, None);
                    let piece_id = created_pieces.get(canonical).cloned().or_else(|| {
                        snapshot
                            .records
                            .get(&base_path)
                            .map(|r| r.content_piece_id.clone())
                    });
                    let Some(piece_id) = piece_id else {
                        warn!(path = %change.path, variant = %key, "Skipping variant file without a base file");
                        report.skipped += 1;
                        continue;
                    };
                    let variant_id = planner.ensure_variant(key);
                    planner.upsert_variant_content(&piece_id, &variant_id, decoded);
                    planner.batch.records.upsert(GitRecord::synced(
                        change.path.clone(),
                        piece_id,
                        Some(variant_id),
                        decoded.hash.clone(),
                    ));
                    report.created += 1;
                }
                (_, Some(record)) => {
                    match &record.variant_id {
                        Some(variant_id) => planner.upsert_variant_content(
                            &record.content_piece_id,
                            variant_id,
                            decoded,
                        ),
                        None => planner.update_piece(&record.content_piece_id, &change.path, decoded)?,
                    }
                    planner.batch.records.upsert(GitRecord::synced(
                        record.path.clone(),
                        record.content_piece_id.clone(),
                        record.variant_id.clone(),
                        decoded.hash.clone(),
                    ));
                    report.updated += 1;
                }
            }
        }

        for record in deletes {
            match &record.variant_id {
                Some(variant_id) => {
                    planner.delete_variant_content(&record.content_piece_id, variant_id);
                    planner.batch.records.delete(record.path.clone());
                }
                None => planner.delete_piece(&record.content_piece_id),
            }
            report.deleted += 1;
        }

        Ok((planner.finish(), report))
    }
}
