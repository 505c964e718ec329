//! Flat content metadata carried alongside a structured document
//!
//! Decoding yields [`PartialMetadata`] (a file may omit any field); encoding
//! requires [`FullMetadata`] (a stored content piece always has a title).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata recovered from an external file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    /// Keys not recognised above, kept verbatim
    #[serde(flatten)]
    pub custom_data: BTreeMap<String, Value>,
}

impl PartialMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Metadata of a stored content piece, as handed to an encoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(flatten)]
    pub custom_data: BTreeMap<String, Value>,
}

impl FullMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl From<FullMetadata> for PartialMetadata {
    fn from(full: FullMetadata) -> Self {
        Self {
            title: Some(full.title),
            description: full.description,
            slug: full.slug,
            filename: full.filename,
            canonical_link: full.canonical_link,
            date: full.date,
            tags: Some(full.tags).filter(|t| !t.is_empty()),
            members: Some(full.members).filter(|m| !m.is_empty()),
            custom_data: full.custom_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_land_in_custom_data() {
        let meta: PartialMetadata =
            serde_yaml::from_str("title: Hello\nweight: 3\n").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Hello"));
        assert_eq!(meta.custom_data.get("weight"), Some(&Value::from(3)));
    }

    #[test]
    fn full_to_partial_drops_empty_lists() {
        let partial = PartialMetadata::from(FullMetadata::titled("T"));
        assert_eq!(partial.title.as_deref(), Some("T"));
        assert!(partial.tags.is_none());
        assert!(partial.members.is_none());
    }

    #[test]
    fn default_partial_is_empty() {
        assert!(PartialMetadata::default().is_empty());
    }
}
