//! Process-level settings file
//!
//! A host process describes its workspace, store, repository and remote
//! transcoders in one file:
//!
//! ```toml
//! workspace = "docs"
//! store_path = ".gitsync"
//! repository_path = "../site"
//!
//! [sync]
//! base_directory = "content"
//! variants_directory = "_variants"
//!
//! [transcoders.mdx]
//! url = "https://transcoder.example.com/mdx/"
//! max_batch_size = 50
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitsync_content::{HttpTranscoder, TranscoderRegistry};
use gitsync_git::LocalGitProvider;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::config::{
    DEFAULT_BASE_VARIANT_DIRECTORY, DEFAULT_MATCH_PATTERN, DEFAULT_TRANSFORMER,
    DEFAULT_VARIANTS_DIRECTORY, SyncConfiguration,
};
use crate::engine::SyncEngine;
use crate::store::FileStore;
use crate::{Error, Result};

/// Name of the settings file looked up by [`SyncSettings::discover`]
pub const SETTINGS_FILE: &str = "gitsync.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub workspace: String,
    /// Directory of the file store, relative to the settings file
    pub store_path: PathBuf,
    /// Local repository standing in for the remote, relative to the settings file
    pub repository_path: PathBuf,
    #[serde(default)]
    pub sync: SyncDefaults,
    /// Remote transcoders by id
    #[serde(default)]
    pub transcoders: BTreeMap<String, RemoteTranscoderSettings>,
    #[serde(skip)]
    root: PathBuf,
}

/// Values for a new [`SyncConfiguration`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncDefaults {
    pub base_directory: String,
    pub match_pattern: String,
    pub transformer: String,
    pub variants_directory: Option<String>,
    pub base_variant_directory: String,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            base_directory: String::new(),
            match_pattern: DEFAULT_MATCH_PATTERN.to_string(),
            transformer: DEFAULT_TRANSFORMER.to_string(),
            variants_directory: Some(DEFAULT_VARIANTS_DIRECTORY.to_string()),
            base_variant_directory: DEFAULT_BASE_VARIANT_DIRECTORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTranscoderSettings {
    pub url: String,
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,
}

impl SyncSettings {
    /// Load settings from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mut settings: Self = match extension.as_str() {
            "toml" => parse(path, &content, |c| toml::from_str(c).map_err(|e| e.to_string()))?,
            "json" => parse(path, &content, |c| {
                serde_json::from_str(c).map_err(|e| e.to_string())
            })?,
            _ => return Err(Error::UnsupportedSettingsFormat { extension }),
        };
        settings.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(settings)
    }

    /// Load `gitsync.toml` from `dir` or its nearest ancestor holding one
    pub fn discover(dir: &Path) -> Result<Self> {
        let found = dir
            .ancestors()
            .map(|d| d.join(SETTINGS_FILE))
            .find(|candidate| candidate.is_file());
        match found {
            Some(path) => Self::load(&path),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{SETTINGS_FILE} not found from {}", dir.display()),
            ))),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.resolve(&self.store_path)
    }

    pub fn repository_dir(&self) -> PathBuf {
        self.resolve(&self.repository_path)
    }

    /// Sync configuration for a first link, not yet synced
    pub fn sync_configuration(&self, provider: &str) -> SyncConfiguration {
        SyncConfiguration::new(provider)
            .with_base_directory(&self.sync.base_directory)
            .with_match_pattern(self.sync.match_pattern.clone())
            .with_transformer(self.sync.transformer.clone())
            .with_variants_directory(self.sync.variants_directory.as_deref())
            .with_base_variant_directory(&self.sync.base_variant_directory)
    }

    /// Built-in transcoders plus every configured remote transcoder
    pub fn transcoder_registry(&self) -> Result<TranscoderRegistry> {
        let mut registry = TranscoderRegistry::with_builtin();
        for (id, remote) in &self.transcoders {
            let mut transcoder = HttpTranscoder::new(id.clone(), &remote.url)?;
            if let Some(size) = remote.max_batch_size {
                transcoder = transcoder.with_max_batch_size(size);
            }
            if let Some(token) = &remote.token {
                transcoder = transcoder.with_bearer_auth(token.clone());
            }
            registry.register(Arc::new(transcoder));
        }
        Ok(registry)
    }

    /// Engine over the file store and the local repository
    pub fn engine(&self) -> Result<SyncEngine> {
        let store = FileStore::open(self.store_dir())?;
        let provider = LocalGitProvider::open(self.repository_dir())?;
        Ok(SyncEngine::new(
            self.workspace.clone(),
            Arc::new(store),
            Arc::new(provider),
            self.transcoder_registry()?,
        ))
    }
}

fn parse<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    from_str: impl FnOnce(&str) -> std::result::Result<T, String>,
) -> Result<T> {
    from_str(content).map_err(|message| Error::SettingsParse {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SETTINGS: &str = r#"
workspace = "docs"
store_path = ".gitsync"
repository_path = "repo"

[sync]
base_directory = "/content/"

[transcoders.mdx]
url = "http://localhost:8080/mdx"
max_batch_size = 10
"#;

    #[test]
    fn load_toml_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, SETTINGS).unwrap();

        let settings = SyncSettings::load(&path).unwrap();
        assert_eq!(settings.workspace, "docs");
        assert_eq!(settings.store_dir(), dir.path().join(".gitsync"));
        assert_eq!(settings.repository_dir(), dir.path().join("repo"));
        assert_eq!(settings.sync.match_pattern, DEFAULT_MATCH_PATTERN);
    }

    #[test]
    fn sync_configuration_from_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, SETTINGS).unwrap();

        let config = SyncSettings::load(&path)
            .unwrap()
            .sync_configuration("local");
        assert_eq!(config.base_directory, "content");
        assert_eq!(config.variants_directory.as_deref(), Some("_variants"));
        assert!(!config.is_synced());
    }

    #[test]
    fn registry_includes_remote_transcoders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, SETTINGS).unwrap();

        let registry = SyncSettings::load(&path)
            .unwrap()
            .transcoder_registry()
            .unwrap();
        let mdx = registry.get("mdx").unwrap();
        assert_eq!(mdx.max_batch_size(), Some(10));
        assert!(registry.get("markdown").is_ok());
    }

    #[test]
    fn discover_walks_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), SETTINGS).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(SyncSettings::discover(&nested).unwrap().workspace, "docs");
    }

    #[test]
    fn rejects_unknown_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gitsync.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            SyncSettings::load(&path),
            Err(Error::UnsupportedSettingsFormat { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "workspace = ").unwrap();
        assert!(matches!(
            SyncSettings::load(&path),
            Err(Error::SettingsParse { .. })
        ));
    }
}
