//! JSON file store, one file per workspace

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::debug;

use super::{SyncStore, WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

/// Store persisting each workspace as `<root>/<workspace>.json`.
///
/// Writers hold an exclusive lock on `<workspace>.lock` across
/// read-modify-write and replace the snapshot by renaming a temp file, so
/// readers under the shared lock never see a partial batch.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn paths(&self, workspace: &str) -> Result<WorkspacePaths> {
        let valid = !workspace.is_empty()
            && workspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidWorkspace {
                id: workspace.to_string(),
            });
        }
        Ok(WorkspacePaths {
            data: self.root.join(format!("{workspace}.json")),
            temp: self.root.join(format!("{workspace}.json.tmp")),
            lock: self.root.join(format!("{workspace}.lock")),
        })
    }

    async fn run<T, F>(&self, workspace: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(WorkspacePaths) -> Result<T> + Send + 'static,
    {
        let paths = self.paths(workspace)?;
        tokio::task::spawn_blocking(move || op(paths)).await?
    }
}

struct WorkspacePaths {
    data: PathBuf,
    temp: PathBuf,
    lock: PathBuf,
}

impl WorkspacePaths {
    fn lock_file(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock)?)
    }

    fn read(&self) -> Result<WorkspaceSnapshot> {
        let mut file = match File::open(&self.data) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkspaceSnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let mut temp = File::create(&self.temp)?;
        temp.write_all(content.as_bytes())?;
        temp.sync_all()?;
        fs::rename(&self.temp, &self.data)?;
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut WorkspaceSnapshot)) -> Result<()> {
        // Held until dropped at the end of the update
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        let mut snapshot = self.read()?;
        change(&mut snapshot);
        self.save(&snapshot)
    }
}

#[async_trait]
impl SyncStore for FileStore {
    async fn load(&self, workspace: &str) -> Result<WorkspaceSnapshot> {
        self.run(workspace, |paths| {
            let lock = paths.lock_file()?;
            lock.lock_shared()?;
            paths.read()
        })
        .await
    }

    async fn write(&self, workspace: &str, batch: WriteBatch) -> Result<()> {
        debug!(workspace, writes = batch.len(), "Writing batch");
        self.run(workspace, move |paths| {
            paths.update(|snapshot| snapshot.apply(batch))
        })
        .await
    }

    async fn reset(&self, workspace: &str) -> Result<()> {
        self.run(workspace, |paths| paths.update(WorkspaceSnapshot::reset_sync))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfiguration;
    use crate::model::GitRecord;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_load_from_new_handle() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        batch
            .records
            .upsert(GitRecord::synced("a.md", "p", None, "sha256:a"));
        batch.config = Some(SyncConfiguration::new("local"));
        store.write("ws", batch).await.unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let snapshot = reopened.load("ws").await.unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.config.unwrap().provider, "local");
        assert!(!dir.path().join("ws.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_workspace_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.load("ws").await.unwrap(),
            WorkspaceSnapshot::default()
        );
    }

    #[tokio::test]
    async fn rejects_path_like_workspace_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("../escape").await,
            Err(Error::InvalidWorkspace { .. })
        ));
    }

    #[tokio::test]
    async fn reset_clears_sync_state() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut batch = WriteBatch::new();
        batch
            .records
            .upsert(GitRecord::synced("a.md", "p", None, "sha256:a"));
        batch.config = Some(SyncConfiguration::new("local"));
        store.write("ws", batch).await.unwrap();

        store.reset("ws").await.unwrap();
        let snapshot = store.load("ws").await.unwrap();
        assert!(snapshot.config.is_none());
        assert!(snapshot.records.is_empty());
    }
}
