//! Persistence of workspace content and sync records
//!
//! Stores hand out whole-workspace snapshots and accept [`WriteBatch`]es. A
//! batch applies every collection's upserts and deletes, and writes the sync
//! configuration last, so a failure part-way never advances the commit
//! high-water mark past records that were not written.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfiguration;
use crate::model::{
    ContentBody, ContentGroup, ContentPiece, ContentPieceVariant, GitDirectory, GitRecord, Keyed,
    Variant,
};
use crate::Result;

/// Everything the engine knows about one workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub config: Option<SyncConfiguration>,
    #[serde(default)]
    pub groups: BTreeMap<String, ContentGroup>,
    #[serde(default)]
    pub pieces: BTreeMap<String, ContentPiece>,
    #[serde(default)]
    pub bodies: BTreeMap<String, ContentBody>,
    #[serde(default)]
    pub variants: BTreeMap<String, Variant>,
    #[serde(default)]
    pub piece_variants: BTreeMap<String, ContentPieceVariant>,
    /// Keyed by base-relative path
    #[serde(default)]
    pub records: BTreeMap<String, GitRecord>,
    /// Keyed by canonical base-relative path
    #[serde(default)]
    pub directories: BTreeMap<String, GitDirectory>,
}

impl WorkspaceSnapshot {
    pub fn apply(&mut self, batch: WriteBatch) {
        batch.groups.apply_to(&mut self.groups);
        batch.pieces.apply_to(&mut self.pieces);
        batch.variants.apply_to(&mut self.variants);
        batch.piece_variants.apply_to(&mut self.piece_variants);
        batch.bodies.apply_to(&mut self.bodies);
        batch.directories.apply_to(&mut self.directories);
        batch.records.apply_to(&mut self.records);
        if let Some(config) = batch.config {
            self.config = Some(config);
        }
    }

    /// Drop the sync configuration and bookkeeping, keeping content
    pub fn reset_sync(&mut self) {
        self.config = None;
        self.records.clear();
        self.directories.clear();
    }

    pub fn body(&self, piece_id: &str, variant_id: Option<&str>) -> Option<&ContentBody> {
        self.bodies.get(&ContentBody::key_for(piece_id, variant_id))
    }

    pub fn variant_by_key(&self, key: &str) -> Option<&Variant> {
        self.variants.values().find(|variant| variant.key == key)
    }

    pub fn piece_variant(&self, piece_id: &str, variant_id: &str) -> Option<&ContentPieceVariant> {
        self.piece_variants
            .values()
            .find(|pv| pv.content_piece_id == piece_id && pv.variant_id == variant_id)
    }

    pub fn directory_for_group(&self, group_id: &str) -> Option<&GitDirectory> {
        self.directories
            .values()
            .find(|dir| dir.content_group_id == group_id)
    }

    pub fn record_for(&self, piece_id: &str, variant_id: Option<&str>) -> Option<&GitRecord> {
        self.records.values().find(|record| {
            record.content_piece_id == piece_id && record.variant_id.as_deref() == variant_id
        })
    }

    /// Pieces of a group in sibling order
    pub fn pieces_in_group(&self, group_id: &str) -> Vec<&ContentPiece> {
        let mut pieces: Vec<_> = self
            .pieces
            .values()
            .filter(|piece| piece.content_group_id == group_id)
            .collect();
        pieces.sort_by(|a, b| a.order.cmp(&b.order));
        pieces
    }
}

/// Upserts and deletes for one collection
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWrite<T> {
    pub upserts: Vec<T>,
    pub deletes: Vec<String>,
}

impl<T> Default for BulkWrite<T> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T: Keyed> BulkWrite<T> {
    pub fn upsert(&mut self, item: T) {
        self.upserts.push(item);
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.deletes.push(key.into());
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    fn apply_to(self, collection: &mut BTreeMap<String, T>) {
        for item in self.upserts {
            collection.insert(item.key(), item);
        }
        for key in self.deletes {
            collection.remove(&key);
        }
    }
}

/// A set of writes applied together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub groups: BulkWrite<ContentGroup>,
    pub pieces: BulkWrite<ContentPiece>,
    pub bodies: BulkWrite<ContentBody>,
    pub variants: BulkWrite<Variant>,
    pub piece_variants: BulkWrite<ContentPieceVariant>,
    pub records: BulkWrite<GitRecord>,
    pub directories: BulkWrite<GitDirectory>,
    /// Written after everything else
    pub config: Option<SyncConfiguration>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_none() && self.len() == 0
    }

    /// Number of entity writes, not counting the configuration
    pub fn len(&self) -> usize {
        self.groups.len()
            + self.pieces.len()
            + self.bodies.len()
            + self.variants.len()
            + self.piece_variants.len()
            + self.records.len()
            + self.directories.len()
    }
}

/// Workspace-scoped persistence used by the engine
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Load a workspace; an unknown workspace loads as empty
    async fn load(&self, workspace: &str) -> Result<WorkspaceSnapshot>;

    async fn write(&self, workspace: &str, batch: WriteBatch) -> Result<()>;

    /// Remove the sync configuration, records and directory mappings
    async fn reset(&self, workspace: &str) -> Result<()>;

    async fn config(&self, workspace: &str) -> Result<Option<SyncConfiguration>> {
        Ok(self.load(workspace).await?.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_upserts_then_deletes() {
        let mut snapshot = WorkspaceSnapshot::default();
        let mut batch = WriteBatch::new();
        batch
            .records
            .upsert(GitRecord::synced("a.md", "p1", None, "sha256:a"));
        batch
            .records
            .upsert(GitRecord::synced("b.md", "p2", None, "sha256:b"));
        batch.records.delete("b.md");
        snapshot.apply(batch);

        assert_eq!(snapshot.records.keys().collect::<Vec<_>>(), vec!["a.md"]);
    }

    #[test]
    fn pieces_in_group_sorted_by_rank() {
        let mut snapshot = WorkspaceSnapshot::default();
        let first = Rank::min().gen_next();
        let second = first.gen_next();
        let mut batch = WriteBatch::new();
        batch.pieces.upsert(ContentPiece::new("g", second, "B"));
        batch.pieces.upsert(ContentPiece::new("g", first, "A"));
        batch.pieces.upsert(ContentPiece::new("other", Rank::min(), "C"));
        snapshot.apply(batch);

        let titles: Vec<_> = snapshot
            .pieces_in_group("g")
            .iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn reset_keeps_content() {
        let mut snapshot = WorkspaceSnapshot {
            config: Some(SyncConfiguration::new("local")),
            ..Default::default()
        };
        let mut batch = WriteBatch::new();
        batch.pieces.upsert(ContentPiece::new("g", Rank::min(), "A"));
        batch
            .records
            .upsert(GitRecord::synced("a.md", "p", None, "sha256:a"));
        snapshot.apply(batch);

        snapshot.reset_sync();
        assert!(snapshot.config.is_none());
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.pieces.len(), 1);
    }
}
