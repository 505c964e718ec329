//! Reconciliation between workspace content and a remote repository
//!
//! The engine is driven by explicit calls: [`SyncEngine::initial_sync`] once,
//! then [`SyncEngine::pull`] with [`SyncEngine::apply_pull`] to bring remote
//! changes in, and [`SyncEngine::push`] (or [`SyncEngine::stage`],
//! [`SyncEngine::commit`] and [`SyncEngine::finalize_commit`]) to send local
//! changes out. Every operation loads the workspace, plans a [`WriteBatch`]
//! and writes it once.

mod commit;
mod initial;
mod local;
mod plan;
mod pull;

pub use commit::{CommitOutcome, StagedChanges};
pub use initial::{InitialSyncReport, RemoteFile, RemoteTree, fetch_tree};
pub use local::{ChangeKind, PendingChange};
pub use pull::{ApplyPullReport, ChangedRecord, PullResult};

use std::sync::Arc;

use gitsync_content::{Transcoder, TranscoderRegistry};
use gitsync_git::RemoteProvider;
use tracing::info;

use crate::config::SyncConfiguration;
use crate::paths::{MatchPattern, PathMapper};
use crate::store::{SyncStore, WorkspaceSnapshot, WriteBatch};
use crate::{Error, Result};

/// Sync engine for one workspace and one remote
pub struct SyncEngine {
    workspace: String,
    store: Arc<dyn SyncStore>,
    provider: Arc<dyn RemoteProvider>,
    transcoders: TranscoderRegistry,
}

impl SyncEngine {
    pub fn new(
        workspace: impl Into<String>,
        store: Arc<dyn SyncStore>,
        provider: Arc<dyn RemoteProvider>,
        transcoders: TranscoderRegistry,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            store,
            provider,
            transcoders,
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn RemoteProvider> {
        &self.provider
    }

    /// Link the workspace to the remote.
    ///
    /// Replaces an existing configuration that has not synced yet.
    pub async fn configure(&self, config: SyncConfiguration) -> Result<()> {
        if let Some(existing) = self.store.config(&self.workspace).await?
            && let Some(commit) = existing.last_commit_id
        {
            return Err(Error::AlreadySynced {
                workspace: self.workspace.clone(),
                commit,
            });
        }

        info!(
            workspace = %self.workspace,
            provider = %config.provider,
            base = %config.base_directory,
            "Configuring sync"
        );
        let batch = WriteBatch {
            config: Some(config),
            ..WriteBatch::default()
        };
        self.store.write(&self.workspace, batch).await
    }

    pub async fn config(&self) -> Result<SyncConfiguration> {
        self.store
            .config(&self.workspace)
            .await?
            .ok_or_else(|| self.config_not_found())
    }

    /// Drop the configuration and all sync bookkeeping, keeping content
    pub async fn reset(&self) -> Result<()> {
        info!(workspace = %self.workspace, "Resetting sync state");
        self.store.reset(&self.workspace).await
    }

    async fn load(&self) -> Result<(WorkspaceSnapshot, SyncContext)> {
        let snapshot = self.store.load(&self.workspace).await?;
        let config = snapshot
            .config
            .clone()
            .ok_or_else(|| self.config_not_found())?;
        let context = SyncContext::new(config, &self.transcoders)?;
        Ok((snapshot, context))
    }

    fn config_not_found(&self) -> Error {
        Error::ConfigNotFound {
            workspace: self.workspace.clone(),
        }
    }

    fn not_synced(&self) -> Error {
        Error::NotSynced {
            workspace: self.workspace.clone(),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("workspace", &self.workspace)
            .field("provider", &self.provider.name())
            .field("transcoders", &self.transcoders)
            .finish()
    }
}

/// Configuration-derived helpers for one operation
pub(crate) struct SyncContext {
    pub config: SyncConfiguration,
    pub base: String,
    pub pattern: MatchPattern,
    pub mapper: PathMapper,
    pub transcoder: Arc<dyn Transcoder>,
}

impl SyncContext {
    fn new(config: SyncConfiguration, transcoders: &TranscoderRegistry) -> Result<Self> {
        Ok(Self {
            base: config.base(),
            pattern: config.pattern()?,
            mapper: config.mapper(),
            transcoder: transcoders.get(&config.transformer)?,
            config,
        })
    }
}
