//! Sending local changes to the remote

use gitsync_content::{EncodeInput, content_hash, encode_all};
use gitsync_git::{CommitRef, CommitRequest, CommitResponse, FileAddition, FileDeletion};
use serde::Serialize;
use tracing::{info, warn};

use super::{SyncContext, SyncEngine};
use crate::model::GitRecord;
use crate::paths;
use crate::store::{WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

/// Result of an optimistic commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CommitOutcome {
    Success(CommitRef),
    /// The remote moved past the last synced commit; pull first
    Stale,
}

/// Local changes prepared for one commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagedChanges {
    /// Paths relative to the repository root
    pub additions: Vec<FileAddition>,
    pub deletions: Vec<FileDeletion>,
    /// Records as they will be once the commit lands
    pub records: Vec<GitRecord>,
    /// Base-relative paths of records to drop once the commit lands
    pub removed_records: Vec<String>,
}

impl StagedChanges {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.removed_records.is_empty()
    }
}

impl SyncEngine {
    /// Encode every locally changed record into file operations
    pub async fn stage(&self) -> Result<StagedChanges> {
        let (snapshot, context) = self.load().await?;
        stage_changes(&snapshot, &context).await
    }

    /// Create one commit on the remote, expecting its tip at the last synced
    /// commit. Nothing is written to the store.
    pub async fn commit(
        &self,
        message: &str,
        additions: Vec<FileAddition>,
        deletions: Vec<FileDeletion>,
    ) -> Result<CommitOutcome> {
        let config = self.config().await?;
        if !config.is_synced() {
            return Err(self.not_synced());
        }

        let request = CommitRequest {
            message: message.to_string(),
            additions,
            deletions,
            expected_commit_id: config.last_commit_id,
        };
        match self.provider.commit_changes(request).await? {
            CommitResponse::Success(commit) => {
                info!(workspace = %self.workspace, commit = %commit.id, "Committed changes");
                Ok(CommitOutcome::Success(commit))
            }
            CommitResponse::StaleData => {
                warn!(workspace = %self.workspace, "Remote moved ahead; commit rejected");
                Ok(CommitOutcome::Stale)
            }
        }
    }

    /// Record a landed commit: staged records become synced and the commit
    /// becomes the new high-water mark
    pub async fn finalize_commit(&self, staged: StagedChanges, commit: &CommitRef) -> Result<()> {
        let mut config = self.config().await?;
        config.last_commit_id = Some(commit.id.clone());
        config.last_commit_date = Some(commit.date);

        let mut batch = WriteBatch::new();
        for record in staged.records {
            batch.records.upsert(record);
        }
        for path in staged.removed_records {
            batch.records.delete(path);
        }
        batch.config = Some(config);
        self.store.write(&self.workspace, batch).await
    }

    /// Stage, commit and finalize in one step.
    ///
    /// Returns `None` when there is nothing to commit. A stale outcome leaves
    /// the store unchanged.
    pub async fn push(&self, message: &str) -> Result<Option<CommitOutcome>> {
        let staged = self.stage().await?;
        if staged.is_empty() {
            info!(workspace = %self.workspace, "Nothing to push");
            return Ok(None);
        }

        if staged.additions.is_empty() && staged.deletions.is_empty() {
            // Only never-committed tombstones: drop them without a commit
            let mut batch = WriteBatch::new();
            for path in staged.removed_records {
                batch.records.delete(path);
            }
            self.store.write(&self.workspace, batch).await?;
            return Ok(None);
        }

        let outcome = self
            .commit(message, staged.additions.clone(), staged.deletions.clone())
            .await?;
        if let CommitOutcome::Success(commit) = &outcome {
            self.finalize_commit(staged, commit).await?;
        }
        Ok(Some(outcome))
    }
}

async fn stage_changes(snapshot: &WorkspaceSnapshot, context: &SyncContext) -> Result<StagedChanges> {
    let mut staged = StagedChanges::default();
    let mut pending = Vec::new();
    let mut inputs = Vec::new();

    for record in snapshot
        .records
        .values()
        .filter(|r| r.has_local_changes() || r.is_abandoned())
    {
        if record.is_deleted_locally() {
            if !record.is_new_locally() {
                staged.deletions.push(FileDeletion {
                    path: paths::join(&context.base, &record.path),
                });
            }
            staged.removed_records.push(record.path.clone());
            continue;
        }

        inputs.push(encode_input(snapshot, record)?);
        pending.push(record);
    }

    let encoded = encode_all(context.transcoder.as_ref(), &inputs).await?;
    for (record, text) in pending.into_iter().zip(encoded) {
        let hash = content_hash(&text);
        staged.additions.push(FileAddition {
            path: paths::join(&context.base, &record.path),
            contents: text,
        });
        staged.records.push(GitRecord::synced(
            record.path.clone(),
            record.content_piece_id.clone(),
            record.variant_id.clone(),
            hash,
        ));
    }

    Ok(staged)
}

/// Content and metadata of the rendition a record tracks
pub(crate) fn encode_input(snapshot: &WorkspaceSnapshot, record: &GitRecord) -> Result<EncodeInput> {
    encode_input_for(snapshot, &record.content_piece_id, record.variant_id.as_deref())
}

pub(crate) fn encode_input_for(
    snapshot: &WorkspaceSnapshot,
    piece_id: &str,
    variant_id: Option<&str>,
) -> Result<EncodeInput> {
    let piece = snapshot
        .pieces
        .get(piece_id)
        .ok_or_else(|| Error::not_found("content piece", piece_id))?;
    let content = snapshot
        .body(piece_id, variant_id)
        .map(|body| body.content.clone())
        .unwrap_or_default();
    let mut metadata = match variant_id.and_then(|v| snapshot.piece_variant(piece_id, v)) {
        Some(piece_variant) => piece_variant.merged_metadata(piece.metadata()),
        None => piece.metadata(),
    };
    // The file name is carried by the record path
    metadata.filename = None;
    Ok(EncodeInput { content, metadata })
}
