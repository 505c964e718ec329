//! Workspace content and sync bookkeeping records

use std::collections::BTreeMap;

use gitsync_content::{FullMetadata, PartialMetadata, StructuredDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::rank::Rank;

/// Generate a fresh entity id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Entities addressable by a single string key in a store
pub trait Keyed {
    fn key(&self) -> String;
}

/// A folder-like container of content pieces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGroup {
    pub id: String,
    pub name: String,
    /// Ancestor ids from the root down to the direct parent
    #[serde(default)]
    pub ancestors: Vec<String>,
    /// Direct child group ids in display order
    #[serde(default)]
    pub descendants: Vec<String>,
}

impl ContentGroup {
    pub fn new(name: impl Into<String>, ancestors: Vec<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            ancestors,
            descendants: Vec::new(),
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(String::as_str)
    }
}

/// A document in a group, ordered among siblings by `order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPiece {
    pub id: String,
    pub content_group_id: String,
    pub order: Rank,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub canonical_link: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, Value>,
}

impl ContentPiece {
    pub fn new(content_group_id: impl Into<String>, order: Rank, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            content_group_id: content_group_id.into(),
            order,
            title: title.into(),
            description: None,
            slug: None,
            filename: None,
            canonical_link: None,
            date: None,
            tags: Vec::new(),
            members: Vec::new(),
            custom_data: BTreeMap::new(),
        }
    }

    /// Replace metadata with what a file carries.
    ///
    /// Fields absent from the file are cleared, except the title, which falls
    /// back to `fallback_title` and then to the current title.
    pub fn apply_metadata(&mut self, metadata: PartialMetadata, fallback_title: Option<&str>) {
        self.title = metadata
            .title
            .or_else(|| fallback_title.map(str::to_string))
            .unwrap_or_else(|| self.title.clone());
        self.description = metadata.description;
        self.slug = metadata.slug;
        self.filename = metadata.filename.or_else(|| self.filename.take());
        self.canonical_link = metadata.canonical_link;
        self.date = metadata.date;
        self.tags = metadata.tags.unwrap_or_default();
        self.members = metadata.members.unwrap_or_default();
        self.custom_data = metadata.custom_data;
    }

    /// Overwrite only the fields present in `metadata`
    pub fn merge_metadata(&mut self, metadata: PartialMetadata) {
        if let Some(title) = metadata.title {
            self.title = title;
        }
        if metadata.description.is_some() {
            self.description = metadata.description;
        }
        if metadata.slug.is_some() {
            self.slug = metadata.slug;
        }
        if metadata.filename.is_some() {
            self.filename = metadata.filename;
        }
        if metadata.canonical_link.is_some() {
            self.canonical_link = metadata.canonical_link;
        }
        if metadata.date.is_some() {
            self.date = metadata.date;
        }
        if let Some(tags) = metadata.tags {
            self.tags = tags;
        }
        if let Some(members) = metadata.members {
            self.members = members;
        }
        self.custom_data.extend(metadata.custom_data);
    }

    pub fn metadata(&self) -> FullMetadata {
        FullMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            slug: self.slug.clone(),
            filename: self.filename.clone(),
            canonical_link: self.canonical_link.clone(),
            date: self.date.clone(),
            tags: self.tags.clone(),
            members: self.members.clone(),
            custom_data: self.custom_data.clone(),
        }
    }
}

/// A named alternative rendition of content, e.g. a locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub key: String,
    pub label: String,
}

impl Variant {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: new_id(),
            label: key.clone(),
            key,
        }
    }
}

/// Metadata overrides of one content piece under one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPieceVariant {
    pub id: String,
    pub content_piece_id: String,
    pub variant_id: String,
    #[serde(default)]
    pub overrides: PartialMetadata,
}

impl ContentPieceVariant {
    pub fn new(content_piece_id: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            content_piece_id: content_piece_id.into(),
            variant_id: variant_id.into(),
            overrides: PartialMetadata::default(),
        }
    }

    /// Base metadata with the present overrides applied on top
    pub fn merged_metadata(&self, base: FullMetadata) -> FullMetadata {
        let overrides = self.overrides.clone();
        FullMetadata {
            title: overrides.title.unwrap_or(base.title),
            description: overrides.description.or(base.description),
            slug: overrides.slug.or(base.slug),
            filename: overrides.filename.or(base.filename),
            canonical_link: overrides.canonical_link.or(base.canonical_link),
            date: overrides.date.or(base.date),
            tags: overrides.tags.unwrap_or(base.tags),
            members: overrides.members.unwrap_or(base.members),
            custom_data: base
                .custom_data
                .into_iter()
                .chain(overrides.custom_data)
                .collect(),
        }
    }
}

/// Structured body of a content piece, or of one of its variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBody {
    pub content_piece_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub content: StructuredDocument,
}

impl ContentBody {
    pub fn new(
        content_piece_id: impl Into<String>,
        variant_id: Option<String>,
        content: StructuredDocument,
    ) -> Self {
        Self {
            content_piece_id: content_piece_id.into(),
            variant_id,
            content,
        }
    }

    /// Store key of the body of `piece_id` under `variant_id`
    pub fn key_for(piece_id: &str, variant_id: Option<&str>) -> String {
        match variant_id {
            Some(variant) => format!("{piece_id}@{variant}"),
            None => piece_id.to_string(),
        }
    }
}

/// Sync bookkeeping for one remote file.
///
/// `current_hash` fingerprints the local content as it would be encoded now,
/// `synced_hash` the content last agreed with the remote. An empty
/// `synced_hash` means never committed; an empty `current_hash` means deleted
/// locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRecord {
    /// Path relative to the configured base directory
    pub path: String,
    pub content_piece_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub current_hash: String,
    pub synced_hash: String,
}

impl GitRecord {
    /// A record for content that matches the remote
    pub fn synced(
        path: impl Into<String>,
        content_piece_id: impl Into<String>,
        variant_id: Option<String>,
        hash: impl Into<String>,
    ) -> Self {
        let hash = hash.into();
        Self {
            path: path.into(),
            content_piece_id: content_piece_id.into(),
            variant_id,
            current_hash: hash.clone(),
            synced_hash: hash,
        }
    }

    pub fn has_local_changes(&self) -> bool {
        self.current_hash != self.synced_hash
    }

    pub fn is_deleted_locally(&self) -> bool {
        self.current_hash.is_empty()
    }

    pub fn is_new_locally(&self) -> bool {
        self.synced_hash.is_empty()
    }

    /// Created and deleted locally without ever being committed
    pub fn is_abandoned(&self) -> bool {
        self.is_deleted_locally() && self.is_new_locally()
    }
}

/// Mapping of a canonical remote directory to a content group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDirectory {
    /// Canonical path relative to the base directory, empty for the base itself
    pub path: String,
    pub content_group_id: String,
}

/// A file changed on both sides since the last sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Path relative to the base directory
    pub path: String,
    pub content_piece_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Remote text, empty when the remote removed the file
    pub pulled_content: String,
    /// Hash of `pulled_content`, empty when the remote removed the file
    pub pulled_hash: String,
}

impl Keyed for ContentGroup {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for ContentPiece {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for Variant {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for ContentPieceVariant {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for ContentBody {
    fn key(&self) -> String {
        Self::key_for(&self.content_piece_id, self.variant_id.as_deref())
    }
}

impl Keyed for GitRecord {
    fn key(&self) -> String {
        self.path.clone()
    }
}

impl Keyed for GitDirectory {
    fn key(&self) -> String {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_metadata_replaces_optional_fields() {
        let mut piece = ContentPiece::new("g", Rank::min(), "Old");
        piece.description = Some("old".into());
        piece.filename = Some("a.md".into());

        piece.apply_metadata(
            PartialMetadata {
                tags: Some(vec!["x".into()]),
                ..Default::default()
            },
            Some("a"),
        );

        assert_eq!(piece.title, "a");
        assert_eq!(piece.description, None);
        assert_eq!(piece.filename.as_deref(), Some("a.md"));
        assert_eq!(piece.tags, vec!["x".to_string()]);
    }

    #[test]
    fn variant_overrides_merge_over_base() {
        let mut variant = ContentPieceVariant::new("p", "v");
        variant.overrides.title = Some("Bonjour".into());

        let mut base = FullMetadata::titled("Hello");
        base.description = Some("greeting".into());

        let merged = variant.merged_metadata(base);
        assert_eq!(merged.title, "Bonjour");
        assert_eq!(merged.description.as_deref(), Some("greeting"));
    }

    #[test]
    fn record_state_flags() {
        let mut record = GitRecord::synced("a.md", "p", None, "sha256:1");
        assert!(!record.has_local_changes());

        record.current_hash = String::new();
        assert!(record.has_local_changes());
        assert!(record.is_deleted_locally());
        assert!(!record.is_new_locally());
    }

    #[test]
    fn body_keys() {
        assert_eq!(ContentBody::key_for("p", None), "p");
        assert_eq!(ContentBody::key_for("p", Some("v")), "p@v");
    }
}
