//! Shared test utilities for the gitsync workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: real git repositories with deterministic commit times
//! - [`provider`]: [`FakeProvider`], an in-memory remote

pub mod git;
pub mod provider;

pub use provider::FakeProvider;
