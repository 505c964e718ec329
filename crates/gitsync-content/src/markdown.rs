//! Built-in Markdown transcoder
//!
//! Files are Markdown with optional YAML frontmatter. Frontmatter keys map to
//! [`PartialMetadata`]; when no `title` key is present, a leading level-1
//! heading is lifted out of the body and used as the title.
//!
//! Malformed frontmatter never fails a decode: the file degrades to an empty
//! document with empty metadata, still fingerprinted over its raw text.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::document::{Block, StructuredDocument};
use crate::error::{Error, Result};
use crate::hash::content_hash;
use crate::metadata::{FullMetadata, PartialMetadata};
use crate::transcoder::{Decoded, EncodeInput, Transcoder};

/// `## Heading` with 1-6 hashes
static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:\s+(.*?))?\s*#*\s*$").unwrap());

/// `1. item` or `1) item`
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,9})[.)]\s+(.*)$").unwrap());

/// Identifier of the built-in transcoder
pub const MARKDOWN_TRANSCODER_ID: &str = "markdown";

/// Markdown + YAML frontmatter transcoder
#[derive(Debug, Default)]
pub struct MarkdownTranscoder;

impl MarkdownTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one file. Never fails.
    pub fn decode_text(&self, text: &str) -> Decoded {
        let hash = content_hash(text);
        let (frontmatter, body) = split_frontmatter(text);

        let mut metadata = match frontmatter {
            Some(yaml) if !yaml.trim().is_empty() => {
                match serde_yaml::from_str::<PartialMetadata>(yaml) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!(error = %e, "Unparseable frontmatter, decoding as empty document");
                        return Decoded {
                            content: StructuredDocument::empty(),
                            metadata: PartialMetadata::default(),
                            hash,
                        };
                    }
                }
            }
            _ => PartialMetadata::default(),
        };

        let mut blocks = parse_blocks(body);
        if metadata.title.is_none()
            && let Some(Block::Heading { level: 1, text }) = blocks.first()
        {
            metadata.title = Some(text.clone());
            blocks.remove(0);
        }

        Decoded {
            content: StructuredDocument::new(blocks),
            metadata,
            hash,
        }
    }

    /// Encode one document with its metadata as frontmatter
    pub fn encode_document(
        &self,
        content: &StructuredDocument,
        metadata: &FullMetadata,
    ) -> Result<String> {
        let yaml =
            serde_yaml::to_string(metadata).map_err(|e| Error::render("YAML", e.to_string()))?;
        let body = render_blocks(&content.blocks);

        let mut out = String::with_capacity(yaml.len() + body.len() + 16);
        out.push_str("---\n");
        out.push_str(&yaml);
        out.push_str("---\n");
        if !body.is_empty() {
            out.push('\n');
            out.push_str(&body);
            out.push('\n');
        }
        Ok(out)
    }
}

#[async_trait]
impl Transcoder for MarkdownTranscoder {
    fn id(&self) -> &str {
        MARKDOWN_TRANSCODER_ID
    }

    async fn decode_batch(&self, texts: &[String]) -> Result<Vec<Decoded>> {
        Ok(texts.iter().map(|t| self.decode_text(t)).collect())
    }

    async fn encode_batch(&self, items: &[EncodeInput]) -> Result<Vec<String>> {
        items
            .iter()
            .map(|item| self.encode_document(&item.content, &item.metadata))
            .collect()
    }
}

/// Split leading `---` fenced frontmatter from the body.
///
/// An opening fence without a closing fence means there is no frontmatter.
fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

fn parse_blocks(body: &str) -> Vec<Block> {
    let lines: Vec<&str> = body.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    let flush = |paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>| {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph {
                text: paragraph.join("\n"),
            });
            paragraph.clear();
        }
    };

    while i < lines.len() {
        let trimmed = lines[i].trim();

        if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if let Some(fence) = fence_marker(trimmed) {
            flush(&mut paragraph, &mut blocks);
            let info = trimmed[fence.len()..].trim();
            let language = (!info.is_empty()).then(|| info.to_string());
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(fence) {
                code.push(lines[i]);
                i += 1;
            }
            // skip closing fence (absent when the block runs to end of file)
            i += 1;
            blocks.push(Block::CodeBlock {
                language,
                code: code.join("\n"),
            });
            continue;
        }

        if let Some(caps) = ATX_HEADING.captures(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                text: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            });
            i += 1;
            continue;
        }

        if is_rule(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::HorizontalRule);
            i += 1;
            continue;
        }

        if trimmed.starts_with('>') {
            flush(&mut paragraph, &mut blocks);
            let mut quoted = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                let line = lines[i].trim_start()[1..].strip_prefix(' ');
                quoted.push(line.unwrap_or(&lines[i].trim_start()[1..]));
                i += 1;
            }
            blocks.push(Block::Blockquote {
                text: quoted.join("\n"),
            });
            continue;
        }

        if bullet_item(trimmed).is_some() {
            flush(&mut paragraph, &mut blocks);
            let mut items = Vec::new();
            while let Some(item) = lines.get(i).and_then(|l| bullet_item(l.trim())) {
                items.push(item.to_string());
                i += 1;
            }
            blocks.push(Block::BulletList { items });
            continue;
        }

        if let Some(caps) = ORDERED_ITEM.captures(trimmed) {
            flush(&mut paragraph, &mut blocks);
            let start = caps[1].parse().unwrap_or(1);
            let mut items = Vec::new();
            while let Some(caps) = lines.get(i).and_then(|l| ORDERED_ITEM.captures(l.trim())) {
                items.push(caps[2].to_string());
                i += 1;
            }
            blocks.push(Block::OrderedList { start, items });
            continue;
        }

        paragraph.push(trimmed);
        i += 1;
    }
    flush(&mut paragraph, &mut blocks);

    blocks
}

fn fence_marker(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn bullet_item(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => {
            format!("{} {}", "#".repeat(usize::from((*level).clamp(1, 6))), text)
        }
        Block::Paragraph { text } => text.clone(),
        Block::CodeBlock { language, code } => {
            format!("```{}\n{}\n```", language.as_deref().unwrap_or(""), code)
        }
        Block::BulletList { items } => items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::OrderedList { start, items } => items
            .iter()
            .zip(*start..)
            .map(|(item, n)| format!("{n}. {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::Blockquote { text } => text
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::HorizontalRule => "---".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_frontmatter_without_fence() {
        assert_eq!(split_frontmatter("# A"), (None, "# A"));
    }

    #[test]
    fn split_frontmatter_with_fence() {
        let (yaml, body) = split_frontmatter("---\ntitle: X\n---\nBody\n");
        assert_eq!(yaml, Some("title: X\n"));
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn unclosed_frontmatter_is_body() {
        let (yaml, body) = split_frontmatter("---\ntitle: X\n");
        assert!(yaml.is_none());
        assert_eq!(body, "---\ntitle: X\n");
    }

    #[test]
    fn rule_detection() {
        assert!(is_rule("---"));
        assert!(is_rule("* * *"));
        assert!(!is_rule("--"));
        assert!(!is_rule("-*-"));
    }

    #[test]
    fn heading_without_text() {
        let blocks = parse_blocks("##\n");
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 2,
                text: String::new()
            }]
        );
    }

    #[test]
    fn unclosed_code_fence_runs_to_end() {
        let blocks = parse_blocks("```rust\nfn main() {}\n");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: Some("rust".into()),
                code: "fn main() {}".into()
            }]
        );
    }
}
