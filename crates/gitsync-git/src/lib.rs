//! Remote repository access for the content/Git sync engine
//!
//! [`RemoteProvider`] is the contract the reconciliation engine consumes:
//! list a directory, find the last commit, list commits since a timestamp,
//! list the files a commit changed, and create a commit guarded by an
//! expected parent. [`LocalGitProvider`] implements it over a repository on
//! disk.

pub mod error;
pub mod local;
pub mod provider;

pub use error::{Error, Result};
pub use local::LocalGitProvider;
pub use provider::{
    ChangedFile, CommitRef, CommitRequest, CommitResponse, DirectoryEntry, EntryKind,
    FileAddition, FileDeletion, FileStatus, RemoteProvider,
};
