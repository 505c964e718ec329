//! In-process store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SyncStore, WorkspaceSnapshot, WriteBatch};
use crate::Result;

/// Store keeping every workspace in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    workspaces: RwLock<HashMap<String, WorkspaceSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a workspace, replacing what it held
    pub async fn insert(&self, workspace: &str, snapshot: WorkspaceSnapshot) {
        self.workspaces
            .write()
            .await
            .insert(workspace.to_string(), snapshot);
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn load(&self, workspace: &str) -> Result<WorkspaceSnapshot> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(workspace)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, workspace: &str, batch: WriteBatch) -> Result<()> {
        self.workspaces
            .write()
            .await
            .entry(workspace.to_string())
            .or_default()
            .apply(batch);
        Ok(())
    }

    async fn reset(&self, workspace: &str) -> Result<()> {
        if let Some(snapshot) = self.workspaces.write().await.get_mut(workspace) {
            snapshot.reset_sync();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfiguration;
    use crate::model::GitRecord;

    #[tokio::test]
    async fn unknown_workspace_loads_empty() {
        let store = MemoryStore::new();
        let snapshot = store.load("missing").await.unwrap();
        assert_eq!(snapshot, WorkspaceSnapshot::default());
    }

    #[tokio::test]
    async fn workspaces_are_isolated() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .records
            .upsert(GitRecord::synced("a.md", "p", None, "sha256:a"));
        batch.config = Some(SyncConfiguration::new("local"));
        store.write("one", batch).await.unwrap();

        assert_eq!(store.load("one").await.unwrap().records.len(), 1);
        assert!(store.load("two").await.unwrap().records.is_empty());
        assert!(store.config("two").await.unwrap().is_none());
    }
}
