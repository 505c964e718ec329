//! Bookkeeping for edits made in the workspace

use gitsync_content::{PartialMetadata, StructuredDocument, content_hash};
use serde::Serialize;
use tracing::{debug, info};

use super::SyncEngine;
use super::commit::encode_input_for;
use crate::model::{Conflict, ContentBody, ContentPieceVariant, GitRecord};
use crate::paths;
use crate::store::{WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

/// Extension given to files of pieces created in the workspace
const NEW_FILE_EXTENSION: &str = "md";

/// How a tracked file differs from the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A tracked file with local changes not yet committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl SyncEngine {
    /// Store new content for a piece (or one of its variants) and refresh the
    /// tracking record's current hash.
    ///
    /// Returns the updated record, or `None` when the rendition is not
    /// tracked.
    pub async fn update_content(
        &self,
        piece_id: &str,
        variant_id: Option<&str>,
        content: StructuredDocument,
        metadata: Option<PartialMetadata>,
    ) -> Result<Option<GitRecord>> {
        let (mut snapshot, context) = self.load().await?;
        let mut piece = snapshot
            .pieces
            .get(piece_id)
            .cloned()
            .ok_or_else(|| Error::not_found("content piece", piece_id))?;

        let mut batch = WriteBatch::new();
        match variant_id {
            Some(variant_id) => {
                if !snapshot.variants.contains_key(variant_id) {
                    return Err(Error::not_found("variant", variant_id));
                }
                let mut piece_variant = snapshot
                    .piece_variant(piece_id, variant_id)
                    .cloned()
                    .unwrap_or_else(|| ContentPieceVariant::new(piece_id, variant_id));
                if let Some(metadata) = metadata {
                    piece_variant.overrides = metadata;
                }
                batch.piece_variants.upsert(piece_variant);
            }
            None => {
                if let Some(metadata) = metadata {
                    piece.merge_metadata(metadata);
                }
                batch.pieces.upsert(piece);
            }
        }
        batch.bodies.upsert(ContentBody::new(
            piece_id,
            variant_id.map(str::to_string),
            content,
        ));

        let record = snapshot.record_for(piece_id, variant_id).cloned();
        let record = match record {
            Some(mut record) => {
                snapshot.apply(batch.clone());
                let input = encode_input_for(&snapshot, piece_id, variant_id)?;
                let text = context
                    .transcoder
                    .encode(&input.content, &input.metadata)
                    .await?;
                record.current_hash = content_hash(&text);
                debug!(path = %record.path, hash = %record.current_hash, "Content changed");
                batch.records.upsert(record.clone());
                Some(record)
            }
            None => None,
        };

        self.store.write(&self.workspace, batch).await?;
        Ok(record)
    }

    /// Start tracking a piece created in the workspace.
    ///
    /// The file goes in the directory mapped to the piece's group and is
    /// named after the piece's filename, slug or title. Returns the existing
    /// record when the piece is already tracked.
    pub async fn track_new_piece(&self, piece_id: &str) -> Result<GitRecord> {
        let (snapshot, context) = self.load().await?;
        if let Some(record) = snapshot.record_for(piece_id, None) {
            return Ok(record.clone());
        }

        let mut piece = snapshot
            .pieces
            .get(piece_id)
            .cloned()
            .ok_or_else(|| Error::not_found("content piece", piece_id))?;
        let directory = snapshot
            .directory_for_group(&piece.content_group_id)
            .ok_or_else(|| Error::not_found("git directory", piece.content_group_id.clone()))?;

        let filename = piece.filename.clone().unwrap_or_else(|| {
            let stem = slugify(piece.slug.as_deref().unwrap_or(&piece.title));
            format!("{stem}.{NEW_FILE_EXTENSION}")
        });
        let path = unique_path(
            &snapshot,
            &context
                .mapper
                .concrete(&paths::join(&directory.path, &filename), None),
            piece_id,
        );
        piece.filename = Some(paths::file_name(&path).to_string());

        let input = encode_input_for(&snapshot, piece_id, None)?;
        let text = context
            .transcoder
            .encode(&input.content, &input.metadata)
            .await?;

        let record = GitRecord {
            path,
            content_piece_id: piece_id.to_string(),
            variant_id: None,
            current_hash: content_hash(&text),
            synced_hash: String::new(),
        };
        info!(path = %record.path, piece = %piece_id, "Tracking new piece");

        let mut batch = WriteBatch::new();
        batch.pieces.upsert(piece);
        batch.records.upsert(record.clone());
        self.store.write(&self.workspace, batch).await?;
        Ok(record)
    }

    /// Mark every file of a piece as deleted locally.
    ///
    /// Returns the number of records marked.
    pub async fn mark_deleted(&self, piece_id: &str) -> Result<usize> {
        let snapshot = self.store.load(&self.workspace).await?;
        let mut batch = WriteBatch::new();
        for record in snapshot
            .records
            .values()
            .filter(|r| r.content_piece_id == piece_id && !r.is_deleted_locally())
        {
            let mut record = record.clone();
            record.current_hash.clear();
            batch.records.upsert(record);
        }

        let marked = batch.records.upserts.len();
        if marked > 0 {
            info!(piece = %piece_id, files = marked, "Marked piece deleted");
            self.store.write(&self.workspace, batch).await?;
        }
        Ok(marked)
    }

    /// Accept the remote side of a conflict as the new sync base.
    ///
    /// Local content is kept, so the next commit writes it over the remote
    /// version.
    pub async fn resolve_conflict(&self, conflict: &Conflict) -> Result<GitRecord> {
        let snapshot = self.store.load(&self.workspace).await?;
        let mut record = snapshot
            .records
            .get(&conflict.path)
            .cloned()
            .ok_or_else(|| Error::not_found("git record", conflict.path.clone()))?;
        record.synced_hash = conflict.pulled_hash.clone();

        info!(path = %record.path, "Resolved conflict");
        let mut batch = WriteBatch::new();
        batch.records.upsert(record.clone());
        self.store.write(&self.workspace, batch).await?;
        Ok(record)
    }

    /// Tracked files with uncommitted local changes, by path
    pub async fn status(&self) -> Result<Vec<PendingChange>> {
        let snapshot = self.store.load(&self.workspace).await?;
        Ok(pending_changes(&snapshot))
    }
}

fn pending_changes(snapshot: &WorkspaceSnapshot) -> Vec<PendingChange> {
    snapshot
        .records
        .values()
        .filter(|record| record.has_local_changes())
        .map(|record| PendingChange {
            path: record.path.clone(),
            kind: if record.is_deleted_locally() {
                ChangeKind::Deleted
            } else if record.is_new_locally() {
                ChangeKind::Added
            } else {
                ChangeKind::Modified
            },
        })
        .collect()
}

/// `path`, or `path` with a piece-id suffix when another piece holds it
fn unique_path(snapshot: &WorkspaceSnapshot, path: &str, piece_id: &str) -> String {
    match snapshot.records.get(path) {
        Some(record) if record.content_piece_id != piece_id => {
            let suffix: String = piece_id.chars().filter(char::is_ascii_alphanumeric).take(8).collect();
            let dir = paths::parent(path);
            let name = match paths::file_name(path).rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{suffix}.{ext}"),
                _ => format!("{}-{suffix}", paths::file_name(path)),
            };
            paths::join(dir, &name)
        }
        _ => path.to_string(),
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}
