//! Error types for gitsync-content

/// Result type for gitsync-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transcoding content
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transcoder '{transcoder}' failed: {message}")]
    Remote { transcoder: String, message: String },

    #[error("Transcoder '{transcoder}' returned {actual} results for a batch of {expected}")]
    BatchMismatch {
        transcoder: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to render {format} content: {message}")]
    Render { format: String, message: String },

    #[error("Unknown transcoder: {0}")]
    UnknownTranscoder(String),

    #[error("Invalid transcoder URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn remote(transcoder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            transcoder: transcoder.into(),
            message: message.into(),
        }
    }

    pub fn render(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            format: format.into(),
            message: message.into(),
        }
    }
}
