//! Bidirectional sync between workspace content and a Git repository
//!
//! Files under a configured base directory become content groups (one per
//! directory) and content pieces (one per file). Each tracked file has a
//! [`GitRecord`] holding the hash of the local content and the hash last agreed
//! with the remote; comparing the two drives commits, and comparing them with
//! incoming remote hashes drives conflict detection on pull.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod paths;
pub mod rank;
pub mod settings;
pub mod store;

pub use config::SyncConfiguration;
pub use engine::{
    ApplyPullReport, ChangeKind, ChangedRecord, CommitOutcome, InitialSyncReport, PendingChange,
    PullResult, RemoteFile, RemoteTree, StagedChanges, SyncEngine, fetch_tree,
};
pub use error::{Error, Result};
pub use model::{
    Conflict, ContentBody, ContentGroup, ContentPiece, ContentPieceVariant, GitDirectory,
    GitRecord, Variant,
};
pub use paths::{MatchPattern, PathKind, PathMapper};
pub use rank::Rank;
pub use settings::SyncSettings;
pub use store::{BulkWrite, FileStore, MemoryStore, SyncStore, WorkspaceSnapshot, WriteBatch};
