//! Structured document model
//!
//! The internal representation of a content piece's body. It is deliberately
//! small: a flat sequence of blocks with inline text kept as source text.

use serde::{Deserialize, Serialize};

/// A block-level element of a structured document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        code: String,
    },
    BulletList {
        items: Vec<String>,
    },
    OrderedList {
        start: u64,
        items: Vec<String>,
    },
    Blockquote {
        text: String,
    },
    HorizontalRule,
}

/// A content piece body as an ordered list of blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub blocks: Vec<Block>,
}

impl StructuredDocument {
    /// Create an empty document
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text of the first heading of the given level, if any
    pub fn first_heading(&self, level: u8) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Heading { level: l, text } if *l == level => Some(text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_has_no_blocks() {
        assert!(StructuredDocument::empty().is_empty());
    }

    #[test]
    fn first_heading_matches_level() {
        let doc = StructuredDocument::new(vec![
            Block::Heading {
                level: 2,
                text: "Sub".into(),
            },
            Block::Heading {
                level: 1,
                text: "Top".into(),
            },
        ]);
        assert_eq!(doc.first_heading(1), Some("Top"));
        assert_eq!(doc.first_heading(3), None);
    }

    #[test]
    fn block_serializes_with_type_tag() {
        let json = serde_json::to_value(Block::HorizontalRule).unwrap();
        assert_eq!(json["type"], "horizontalRule");
    }
}
