//! Shared fixtures for engine tests
#![allow(dead_code)]

use std::sync::Arc;

use gitsync_content::TranscoderRegistry;
use gitsync_core::{
    ContentPiece, MemoryStore, SyncConfiguration, SyncEngine, SyncStore, WorkspaceSnapshot,
};
use gitsync_test_utils::FakeProvider;

pub const WORKSPACE: &str = "ws";

/// Remote layout used by most engine tests
pub const SITE: &[(&str, &str)] = &[
    ("docs/a.md", "# A\n\nHello\n"),
    ("docs/b.md", "---\ntitle: B\n---\n\nBee\n"),
    ("docs/guides/c.md", "# C\n"),
    ("docs/notes.txt", "not content"),
    ("docs/_variants/_base/intro.md", "# Intro\n\nWelcome\n"),
    ("docs/_variants/fr/intro.md", "# Introduction\n\nBienvenue\n"),
    ("docs/_variants/fr/orphan.md", "# Orphan\n"),
    ("outside/x.md", "# X\n"),
];

pub struct Harness {
    pub engine: SyncEngine,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
}

impl Harness {
    pub fn new(provider: FakeProvider) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let engine = SyncEngine::new(
            WORKSPACE,
            store.clone(),
            provider.clone(),
            TranscoderRegistry::with_builtin(),
        );
        Self {
            engine,
            store,
            provider,
        }
    }

    /// Configured for `docs/` but not yet synced
    pub async fn configured(files: &[(&str, &str)]) -> Self {
        let harness = Self::new(FakeProvider::with_files(files));
        harness
            .engine
            .configure(config())
            .await
            .expect("configure");
        harness
    }

    /// Configured and initially synced against `files`
    pub async fn synced(files: &[(&str, &str)]) -> Self {
        let harness = Self::configured(files).await;
        harness.engine.initial_sync().await.expect("initial sync");
        harness
    }

    pub async fn snapshot(&self) -> WorkspaceSnapshot {
        self.store.load(WORKSPACE).await.expect("load")
    }

    pub async fn piece(&self, title: &str) -> ContentPiece {
        piece_by_title(&self.snapshot().await, title)
    }

    /// Pull and apply in one go
    pub async fn sync_down(&self) -> gitsync_core::ApplyPullReport {
        let pulled = self.engine.pull().await.expect("pull");
        self.engine.apply_pull(&pulled).await.expect("apply pull")
    }
}

pub fn config() -> SyncConfiguration {
    SyncConfiguration::new("fake").with_base_directory("docs")
}

pub fn piece_by_title(snapshot: &WorkspaceSnapshot, title: &str) -> ContentPiece {
    snapshot
        .pieces
        .values()
        .find(|p| p.title == title)
        .cloned()
        .unwrap_or_else(|| panic!("no piece titled {title}"))
}
