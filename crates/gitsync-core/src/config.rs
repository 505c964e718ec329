//! Per-workspace sync configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths::{self, MatchPattern, PathMapper};
use crate::Result;

pub const DEFAULT_MATCH_PATTERN: &str = "**/*.md";
pub const DEFAULT_TRANSFORMER: &str = gitsync_content::MARKDOWN_TRANSCODER_ID;
pub const DEFAULT_VARIANTS_DIRECTORY: &str = "_variants";
pub const DEFAULT_BASE_VARIANT_DIRECTORY: &str = "_base";

/// Link between a workspace and a directory of a remote repository.
///
/// `last_commit_id` is the high-water mark of the remote history already
/// reconciled. It is `None` until the initial sync completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfiguration {
    pub provider: String,
    #[serde(default)]
    pub base_directory: String,
    #[serde(default = "default_match_pattern")]
    pub match_pattern: String,
    #[serde(default = "default_transformer")]
    pub transformer: String,
    #[serde(default)]
    pub variants_directory: Option<String>,
    #[serde(default = "default_base_variant_directory")]
    pub base_variant_directory: String,
    #[serde(default)]
    pub last_commit_id: Option<String>,
    #[serde(default)]
    pub last_commit_date: Option<DateTime<Utc>>,
}

fn default_match_pattern() -> String {
    DEFAULT_MATCH_PATTERN.to_string()
}

fn default_transformer() -> String {
    DEFAULT_TRANSFORMER.to_string()
}

fn default_base_variant_directory() -> String {
    DEFAULT_BASE_VARIANT_DIRECTORY.to_string()
}

impl SyncConfiguration {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            base_directory: String::new(),
            match_pattern: default_match_pattern(),
            transformer: default_transformer(),
            variants_directory: Some(DEFAULT_VARIANTS_DIRECTORY.to_string()),
            base_variant_directory: default_base_variant_directory(),
            last_commit_id: None,
            last_commit_date: None,
        }
    }

    pub fn with_base_directory(mut self, dir: &str) -> Self {
        self.base_directory = paths::normalize(dir);
        self
    }

    pub fn with_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = pattern.into();
        self
    }

    pub fn with_transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = transformer.into();
        self
    }

    pub fn with_variants_directory(mut self, dir: Option<&str>) -> Self {
        self.variants_directory = dir.map(paths::normalize);
        self
    }

    pub fn with_base_variant_directory(mut self, dir: &str) -> Self {
        self.base_variant_directory = paths::normalize(dir);
        self
    }

    pub fn is_synced(&self) -> bool {
        self.last_commit_id.is_some()
    }

    pub fn base(&self) -> String {
        paths::normalize(&self.base_directory)
    }

    pub fn pattern(&self) -> Result<MatchPattern> {
        MatchPattern::new(&self.match_pattern)
    }

    pub fn mapper(&self) -> PathMapper {
        PathMapper::from_config(self)
    }
}
