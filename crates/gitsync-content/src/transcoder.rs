//! Transcoder trait and batching helpers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::StructuredDocument;
use crate::error::{Error, Result};
use crate::metadata::{FullMetadata, PartialMetadata};

/// Result of decoding one external file
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub content: StructuredDocument,
    pub metadata: PartialMetadata,
    /// Fingerprint of the raw input text, never of the parsed structure
    pub hash: String,
}

/// One item to encode into external text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeInput {
    pub content: StructuredDocument,
    pub metadata: FullMetadata,
}

/// Bidirectional conversion between external text and structured content.
///
/// Implementations must compute [`Decoded::hash`] with
/// [`content_hash`](crate::content_hash) over the raw input text and must
/// return batch results in input order.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Identifier used to select this transcoder from a sync configuration
    fn id(&self) -> &str;

    /// Largest batch the transcoder accepts per call, if limited
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Decode a batch of texts, preserving order
    async fn decode_batch(&self, texts: &[String]) -> Result<Vec<Decoded>>;

    /// Encode a batch of documents, preserving order
    async fn encode_batch(&self, items: &[EncodeInput]) -> Result<Vec<String>>;

    async fn decode(&self, text: &str) -> Result<Decoded> {
        let mut decoded = self.decode_batch(&[text.to_string()]).await?;
        match decoded.len() {
            1 => Ok(decoded.remove(0)),
            actual => Err(Error::BatchMismatch {
                transcoder: self.id().to_string(),
                expected: 1,
                actual,
            }),
        }
    }

    async fn encode(&self, content: &StructuredDocument, metadata: &FullMetadata) -> Result<String> {
        let input = EncodeInput {
            content: content.clone(),
            metadata: metadata.clone(),
        };
        let mut encoded = self.encode_batch(std::slice::from_ref(&input)).await?;
        match encoded.len() {
            1 => Ok(encoded.remove(0)),
            actual => Err(Error::BatchMismatch {
                transcoder: self.id().to_string(),
                expected: 1,
                actual,
            }),
        }
    }
}

/// Decode any number of texts, chunked to the transcoder's batch limit.
///
/// Chunks are sent one after another; output order matches input order. The
/// first failing chunk fails the whole call.
pub async fn decode_all(transcoder: &dyn Transcoder, texts: &[String]) -> Result<Vec<Decoded>> {
    let mut out = Vec::with_capacity(texts.len());
    for chunk in chunks(texts, transcoder.max_batch_size()) {
        let decoded = transcoder.decode_batch(chunk).await?;
        check_len(transcoder, chunk.len(), decoded.len())?;
        out.extend(decoded);
    }
    Ok(out)
}

/// Encode any number of documents, chunked to the transcoder's batch limit.
pub async fn encode_all(transcoder: &dyn Transcoder, items: &[EncodeInput]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(items.len());
    for chunk in chunks(items, transcoder.max_batch_size()) {
        let encoded = transcoder.encode_batch(chunk).await?;
        check_len(transcoder, chunk.len(), encoded.len())?;
        out.extend(encoded);
    }
    Ok(out)
}

fn chunks<T>(items: &[T], limit: Option<usize>) -> std::slice::Chunks<'_, T> {
    let size = limit.filter(|n| *n > 0).unwrap_or(items.len()).max(1);
    items.chunks(size)
}

fn check_len(transcoder: &dyn Transcoder, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::BatchMismatch {
            transcoder: transcoder.id().to_string(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_limit() {
        let items = [1, 2, 3, 4, 5];
        let sizes: Vec<_> = chunks(&items, Some(2)).map(<[i32]>::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn chunks_without_limit_is_single_batch() {
        let items = [1, 2, 3];
        assert_eq!(chunks(&items, None).count(), 1);
    }

    #[test]
    fn chunks_of_empty_input_is_empty() {
        let items: [i32; 0] = [];
        assert_eq!(chunks(&items, Some(4)).count(), 0);
        assert_eq!(chunks(&items, None).count(), 0);
    }

    #[test]
    fn zero_limit_is_treated_as_unlimited() {
        let items = [1, 2, 3];
        assert_eq!(chunks(&items, Some(0)).count(), 1);
    }
}
