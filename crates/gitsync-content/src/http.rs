//! HTTP-delegated transcoder
//!
//! Delegates conversion to an external service:
//!
//! - `POST <url>/input` with a JSON array of texts, answered by an array of
//!   `{ "content": ..., "metadata": ... }` objects
//! - `POST <url>/output` with an array of `{ "content", "metadata" }` objects,
//!   answered by an array of texts
//!
//! Fingerprints are always computed locally over the raw text. Any transport
//! error, non-success status or length mismatch fails the whole batch.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::document::StructuredDocument;
use crate::error::{Error, Result};
use crate::hash::content_hash;
use crate::metadata::PartialMetadata;
use crate::transcoder::{Decoded, EncodeInput, Transcoder};

#[derive(Debug, Deserialize)]
struct RemoteDecoded {
    #[serde(default)]
    content: StructuredDocument,
    #[serde(default)]
    metadata: PartialMetadata,
}

/// Transcoder backed by a remote HTTP service
#[derive(Debug, Clone)]
pub struct HttpTranscoder {
    id: String,
    base_url: Url,
    client: Client,
    bearer_auth: Option<String>,
    max_batch_size: Option<usize>,
}

impl HttpTranscoder {
    /// Create a transcoder for the service rooted at `base_url`
    pub fn new(id: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            base_url: Self::normalize_base(base_url)?,
            client: Client::new(),
            bearer_auth: None,
            max_batch_size: None,
        })
    }

    pub fn with_bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_auth = Some(token.into());
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Base URL with a trailing slash, so endpoint joins append
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn normalize_base(raw: &str) -> Result<Url> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = self.base_url.join(endpoint)?;
        let mut request = self.client.post(url).json(body);

        if let Some(auth) = &self.bearer_auth {
            request = request.bearer_auth(auth);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::remote(&self.id, format!("{status}: {message}")));
        }
        Ok(response.json().await?)
    }

    fn check_len(&self, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::BatchMismatch {
                transcoder: self.id.clone(),
                expected,
                actual,
            })
        }
    }
}

#[async_trait]
impl Transcoder for HttpTranscoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    async fn decode_batch(&self, texts: &[String]) -> Result<Vec<Decoded>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(transcoder = %self.id, count = texts.len(), "Remote decode");
        let remote: Vec<RemoteDecoded> = self.post("input", texts).await?;
        self.check_len(texts.len(), remote.len())?;

        Ok(texts
            .iter()
            .zip(remote)
            .map(|(text, decoded)| Decoded {
                content: decoded.content,
                metadata: decoded.metadata,
                hash: content_hash(text),
            })
            .collect())
    }

    async fn encode_batch(&self, items: &[EncodeInput]) -> Result<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(transcoder = %self.id, count = items.len(), "Remote encode");
        let texts: Vec<String> = self.post("output", items).await?;
        self.check_len(items.len(), texts.len())?;
        Ok(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let t = HttpTranscoder::new("remote", "https://transcode.example.com/api").unwrap();
        assert_eq!(t.base_url().as_str(), "https://transcode.example.com/api/");
        assert_eq!(
            t.base_url().join("input").unwrap().as_str(),
            "https://transcode.example.com/api/input"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            HttpTranscoder::new("remote", "not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn batch_size_is_advertised() {
        let t = HttpTranscoder::new("remote", "http://localhost:9000")
            .unwrap()
            .with_max_batch_size(25);
        assert_eq!(t.max_batch_size(), Some(25));
    }

    #[tokio::test]
    async fn empty_batches_skip_the_network() {
        let t = HttpTranscoder::new("remote", "http://127.0.0.1:9").unwrap();
        assert!(t.decode_batch(&[]).await.unwrap().is_empty());
        assert!(t.encode_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_fails_the_batch() {
        let t = HttpTranscoder::new("remote", "http://127.0.0.1:9").unwrap();
        let result = t.decode_batch(&["# A".to_string()]).await;
        assert!(result.is_err());
    }
}
