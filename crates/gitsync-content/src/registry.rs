//! Transcoder lookup by id

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::markdown::MarkdownTranscoder;
use crate::transcoder::Transcoder;

/// Registry of available transcoders, keyed by [`Transcoder::id`]
#[derive(Clone)]
pub struct TranscoderRegistry {
    transcoders: HashMap<String, Arc<dyn Transcoder>>,
}

impl TranscoderRegistry {
    /// Create a registry with no transcoders
    pub fn empty() -> Self {
        Self {
            transcoders: HashMap::new(),
        }
    }

    /// Create a registry containing the built-in Markdown transcoder
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MarkdownTranscoder::new()));
        registry
    }

    /// Register a transcoder, replacing any previous one with the same id
    pub fn register(&mut self, transcoder: Arc<dyn Transcoder>) {
        self.transcoders
            .insert(transcoder.id().to_string(), transcoder);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Transcoder>> {
        self.transcoders
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownTranscoder(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.transcoders.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for TranscoderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for TranscoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscoderRegistry")
            .field("transcoders", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpTranscoder;

    #[test]
    fn builtin_registry_has_markdown() {
        let registry = TranscoderRegistry::with_builtin();
        assert_eq!(registry.get("markdown").unwrap().id(), "markdown");
    }

    #[test]
    fn unknown_id_is_an_error() {
        let registry = TranscoderRegistry::with_builtin();
        assert!(matches!(
            registry.get("asciidoc"),
            Err(Error::UnknownTranscoder(id)) if id == "asciidoc"
        ));
    }

    #[test]
    fn remote_transcoders_register_under_their_id() {
        let mut registry = TranscoderRegistry::with_builtin();
        registry.register(Arc::new(
            HttpTranscoder::new("mdx", "http://localhost:4000").unwrap(),
        ));
        assert_eq!(registry.ids(), vec!["markdown", "mdx"]);
    }
}
