//! Write planning shared by initial sync and pull
//!
//! A [`Planner`] layers new and modified groups, directories, variants and
//! sibling ranks over a loaded snapshot, and collects everything into one
//! [`WriteBatch`].

use std::collections::{BTreeMap, HashMap};

use gitsync_content::Decoded;
use tracing::debug;

use crate::model::{ContentBody, ContentGroup, ContentPiece, ContentPieceVariant, GitDirectory, Variant};
use crate::paths;
use crate::rank::{Rank, RankCursor};
use crate::store::{WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

pub(crate) struct Planner<'a> {
    snapshot: &'a WorkspaceSnapshot,
    root_name: String,
    groups: BTreeMap<String, ContentGroup>,
    directories: BTreeMap<String, GitDirectory>,
    variants: BTreeMap<String, Variant>,
    ranks: HashMap<String, RankCursor>,
    pub batch: WriteBatch,
}

impl<'a> Planner<'a> {
    pub fn new(snapshot: &'a WorkspaceSnapshot, base_directory: &str) -> Self {
        let root_name = match paths::file_name(base_directory) {
            "" => "root".to_string(),
            name => name.to_string(),
        };
        Self {
            snapshot,
            root_name,
            groups: BTreeMap::new(),
            directories: BTreeMap::new(),
            variants: BTreeMap::new(),
            ranks: HashMap::new(),
            batch: WriteBatch::new(),
        }
    }

    fn group(&self, id: &str) -> Option<&ContentGroup> {
        self.groups.get(id).or_else(|| self.snapshot.groups.get(id))
    }

    fn directory(&self, path: &str) -> Option<&GitDirectory> {
        self.directories
            .get(path)
            .or_else(|| self.snapshot.directories.get(path))
    }

    /// Group id for a canonical directory, creating the directory, its group
    /// and any missing ancestors
    pub fn ensure_directory(&mut self, path: &str) -> Result<String> {
        if let Some(dir) = self.directory(path) {
            return Ok(dir.content_group_id.clone());
        }

        let group = if path.is_empty() {
            ContentGroup::new(self.root_name.clone(), Vec::new())
        } else {
            let parent_id = self.ensure_directory(paths::parent(path))?;
            let mut parent = self
                .group(&parent_id)
                .cloned()
                .ok_or_else(|| Error::not_found("content group", parent_id.clone()))?;

            let mut ancestors = parent.ancestors.clone();
            ancestors.push(parent_id.clone());
            let group = ContentGroup::new(paths::file_name(path), ancestors);

            parent.descendants.push(group.id.clone());
            self.groups.insert(parent_id, parent);
            group
        };

        debug!(path, group = %group.id, "Mapping directory");
        let id = group.id.clone();
        self.directories.insert(
            path.to_string(),
            GitDirectory {
                path: path.to_string(),
                content_group_id: id.clone(),
            },
        );
        self.groups.insert(id.clone(), group);
        Ok(id)
    }

    /// Next rank after the last sibling in `group_id`, counting pieces
    /// planned earlier
    pub fn next_rank(&mut self, group_id: &str) -> Rank {
        let snapshot = self.snapshot;
        self.ranks
            .entry(group_id.to_string())
            .or_insert_with(|| {
                let last = snapshot
                    .pieces_in_group(group_id)
                    .last()
                    .map(|piece| piece.order.clone());
                RankCursor::after(last)
            })
            .next_rank()
    }

    /// Variant id for `key`, creating the variant when unknown
    pub fn ensure_variant(&mut self, key: &str) -> String {
        if let Some(variant) = self.snapshot.variant_by_key(key) {
            return variant.id.clone();
        }
        self.variants
            .entry(key.to_string())
            .or_insert_with(|| Variant::new(key))
            .id
            .clone()
    }

    /// Plan a new content piece for a base file at `path`
    pub fn create_piece(&mut self, group_id: &str, path: &str, decoded: &Decoded) -> String {
        let order = self.next_rank(group_id);
        let stem = paths::file_stem(path);
        let mut piece = ContentPiece::new(group_id, order, stem);
        piece.apply_metadata(decoded.metadata.clone(), Some(stem));
        piece.filename = Some(paths::file_name(path).to_string());

        let id = piece.id.clone();
        self.batch.pieces.upsert(piece);
        self.batch
            .bodies
            .upsert(ContentBody::new(id.clone(), None, decoded.content.clone()));
        id
    }

    /// Plan an overwrite of an existing piece from a base file at `path`
    pub fn update_piece(&mut self, piece_id: &str, path: &str, decoded: &Decoded) -> Result<()> {
        let mut piece = self
            .snapshot
            .pieces
            .get(piece_id)
            .cloned()
            .ok_or_else(|| Error::not_found("content piece", piece_id))?;
        piece.apply_metadata(decoded.metadata.clone(), Some(paths::file_stem(path)));
        piece.filename = Some(paths::file_name(path).to_string());

        self.batch.pieces.upsert(piece);
        self.batch.bodies.upsert(ContentBody::new(
            piece_id,
            None,
            decoded.content.clone(),
        ));
        Ok(())
    }

    /// Plan the variant rendition of `piece_id` from a variant file
    pub fn upsert_variant_content(&mut self, piece_id: &str, variant_id: &str, decoded: &Decoded) {
        let mut piece_variant = self
            .snapshot
            .piece_variant(piece_id, variant_id)
            .cloned()
            .unwrap_or_else(|| ContentPieceVariant::new(piece_id, variant_id));
        piece_variant.overrides = decoded.metadata.clone();

        self.batch.piece_variants.upsert(piece_variant);
        self.batch.bodies.upsert(ContentBody::new(
            piece_id,
            Some(variant_id.to_string()),
            decoded.content.clone(),
        ));
    }

    /// Plan removal of a piece with every rendition and record of it
    pub fn delete_piece(&mut self, piece_id: &str) {
        self.batch.pieces.delete(piece_id);
        self.batch.bodies.delete(ContentBody::key_for(piece_id, None));
        for piece_variant in self
            .snapshot
            .piece_variants
            .values()
            .filter(|pv| pv.content_piece_id == piece_id)
        {
            self.batch.piece_variants.delete(piece_variant.id.clone());
            self.batch.bodies.delete(ContentBody::key_for(
                piece_id,
                Some(&piece_variant.variant_id),
            ));
        }
        for record in self
            .snapshot
            .records
            .values()
            .filter(|record| record.content_piece_id == piece_id)
        {
            self.batch.records.delete(record.path.clone());
        }
    }

    /// Plan removal of one variant rendition of a piece
    pub fn delete_variant_content(&mut self, piece_id: &str, variant_id: &str) {
        if let Some(piece_variant) = self.snapshot.piece_variant(piece_id, variant_id) {
            self.batch.piece_variants.delete(piece_variant.id.clone());
        }
        self.batch
            .bodies
            .delete(ContentBody::key_for(piece_id, Some(variant_id)));
    }

    /// Move planned groups, directories and variants into the batch
    pub fn finish(mut self) -> WriteBatch {
        for group in self.groups.into_values() {
            self.batch.groups.upsert(group);
        }
        for directory in self.directories.into_values() {
            self.batch.directories.upsert(directory);
        }
        for variant in self.variants.into_values() {
            self.batch.variants.upsert(variant);
        }
        self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsync_content::{PartialMetadata, StructuredDocument};
    use pretty_assertions::assert_eq;

    fn decoded(title: &str) -> Decoded {
        Decoded {
            content: StructuredDocument::empty(),
            metadata: PartialMetadata {
                title: Some(title.to_string()),
                ..Default::default()
            },
            hash: "sha256:x".to_string(),
        }
    }

    #[test]
    fn ensure_directory_creates_ancestors_once() {
        let snapshot = WorkspaceSnapshot::default();
        let mut planner = Planner::new(&snapshot, "content");

        let guides = planner.ensure_directory("docs/guides").unwrap();
        let again = planner.ensure_directory("docs/guides").unwrap();
        assert_eq!(guides, again);

        let batch = planner.finish();
        assert_eq!(batch.directories.upserts.len(), 3);
        assert_eq!(batch.groups.upserts.len(), 3);

        let root = batch
            .groups
            .upserts
            .iter()
            .find(|g| g.name == "content")
            .unwrap();
        let docs = batch.groups.upserts.iter().find(|g| g.name == "docs").unwrap();
        let leaf = batch
            .groups
            .upserts
            .iter()
            .find(|g| g.name == "guides")
            .unwrap();
        assert_eq!(root.descendants, vec![docs.id.clone()]);
        assert_eq!(leaf.ancestors, vec![root.id.clone(), docs.id.clone()]);
    }

    #[test]
    fn pieces_get_increasing_ranks() {
        let snapshot = WorkspaceSnapshot::default();
        let mut planner = Planner::new(&snapshot, "");
        let group = planner.ensure_directory("").unwrap();

        planner.create_piece(&group, "a.md", &decoded("A"));
        planner.create_piece(&group, "b.md", &decoded("B"));
        let batch = planner.finish();

        let a = &batch.pieces.upserts[0];
        let b = &batch.pieces.upserts[1];
        assert!(a.order < b.order);
        assert_eq!(a.filename.as_deref(), Some("a.md"));
    }

    #[test]
    fn ensure_variant_reuses_planned_variant() {
        let snapshot = WorkspaceSnapshot::default();
        let mut planner = Planner::new(&snapshot, "");
        let first = planner.ensure_variant("fr");
        let second = planner.ensure_variant("fr");
        assert_eq!(first, second);
        assert_eq!(planner.finish().variants.upserts.len(), 1);
    }
}
