//! Content transcoding for the content/Git sync engine
//!
//! Converts between the plain-text files stored in a repository and the
//! structured documents (plus flat metadata) stored locally. Transcoders are
//! pluggable: the built-in Markdown transcoder and HTTP-delegated transcoders
//! share the [`Transcoder`] contract.

pub mod document;
pub mod error;
pub mod hash;
pub mod http;
pub mod markdown;
pub mod metadata;
pub mod registry;
pub mod transcoder;

pub use document::{Block, StructuredDocument};
pub use error::{Error, Result};
pub use hash::content_hash;
pub use http::HttpTranscoder;
pub use markdown::{MARKDOWN_TRANSCODER_ID, MarkdownTranscoder};
pub use metadata::{FullMetadata, PartialMetadata};
pub use registry::TranscoderRegistry;
pub use transcoder::{Decoded, EncodeInput, Transcoder, decode_all, encode_all};
