//! Repository path handling
//!
//! Remote paths are `/`-separated and relative to the repository root. The
//! engine stores paths relative to the configured base directory. Files in a
//! variants subtree are addressed by a canonical path where the variant key
//! segment is replaced with [`VARIANT_PLACEHOLDER`], so every variant of a
//! directory maps to one content group.

use regex::Regex;

use crate::config::SyncConfiguration;
use crate::{Error, Result};

/// Segment standing in for the variant key in canonical paths
pub const VARIANT_PLACEHOLDER: &str = "[variant]";

/// Classification of a base-relative file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// A base file, holding its canonical path
    Base { path: String },
    /// A variant file, holding its variant key and canonical path
    Variant { key: String, path: String },
}

impl PathKind {
    pub fn canonical_path(&self) -> &str {
        match self {
            PathKind::Base { path } | PathKind::Variant { path, .. } => path,
        }
    }

    pub fn variant_key(&self) -> Option<&str> {
        match self {
            PathKind::Base { .. } => None,
            PathKind::Variant { key, .. } => Some(key),
        }
    }
}

/// Maps between concrete and canonical paths for one sync configuration
#[derive(Debug, Clone)]
pub struct PathMapper {
    variants_directory: Option<String>,
    base_variant_directory: String,
}

impl PathMapper {
    pub fn new(variants_directory: Option<&str>, base_variant_directory: &str) -> Self {
        Self {
            variants_directory: variants_directory
                .map(normalize)
                .filter(|dir| !dir.is_empty()),
            base_variant_directory: normalize(base_variant_directory),
        }
    }

    pub fn from_config(config: &SyncConfiguration) -> Self {
        Self::new(
            config.variants_directory.as_deref(),
            &config.base_variant_directory,
        )
    }

    /// Classify a base-relative file path.
    ///
    /// `<variants>/<key>/<rest>` is a variant file unless `key` is the base
    /// variant directory, in which case it is a base file living in the
    /// variants subtree.
    pub fn classify(&self, path: &str) -> PathKind {
        match self.split_variant(path) {
            Some((key, rest)) => {
                let canonical = self.canonical(rest);
                if key == self.base_variant_directory {
                    PathKind::Base { path: canonical }
                } else {
                    PathKind::Variant {
                        key: key.to_string(),
                        path: canonical,
                    }
                }
            }
            None => PathKind::Base {
                path: path.to_string(),
            },
        }
    }

    /// Canonical form of a base-relative directory path
    pub fn canonical_directory(&self, dir: &str) -> String {
        match self.split_variant(dir) {
            Some((_, rest)) => self.canonical(rest),
            None => {
                let variant_root = self
                    .variants_directory
                    .as_deref()
                    .and_then(|variants| dir.strip_prefix(variants))
                    .and_then(|tail| tail.strip_prefix('/'))
                    .is_some_and(|key| !key.is_empty() && !key.contains('/'));
                if variant_root {
                    self.canonical("")
                } else {
                    dir.to_string()
                }
            }
        }
    }

    /// Concrete path for a canonical path, using `key` or the base variant directory
    pub fn concrete(&self, canonical: &str, key: Option<&str>) -> String {
        let segment = key.unwrap_or(&self.base_variant_directory);
        canonical
            .split('/')
            .map(|part| {
                if part == VARIANT_PLACEHOLDER {
                    segment
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn split_variant<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let variants = self.variants_directory.as_deref()?;
        let tail = path.strip_prefix(variants)?.strip_prefix('/')?;
        let (key, rest) = tail.split_once('/')?;
        if key.is_empty() {
            return None;
        }
        Some((key, rest))
    }

    fn canonical(&self, rest: &str) -> String {
        let variants = self.variants_directory.as_deref().unwrap_or_default();
        let prefix = join(variants, VARIANT_PLACEHOLDER);
        join(&prefix, rest)
    }
}

/// Glob matcher for base-relative file paths.
///
/// Supports `*` (within a segment), `**` (across segments), `?` and `{a,b}`
/// alternation.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    pattern: String,
    regex: Regex,
}

impl MatchPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}

/// Trim and collapse separators: `/docs//guides/` becomes `docs/guides`
pub fn normalize(path: &str) -> String {
    path.trim()
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two relative paths, either of which may be empty
pub fn join(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left}/{right}"),
    }
}

/// Strip `base` from a repository path, `None` when the path lies outside it
pub fn relative_to(base: &str, path: &str) -> Option<String> {
    if base.is_empty() {
        return Some(path.to_string());
    }
    path.strip_prefix(base)
        .and_then(|tail| tail.strip_prefix('/'))
        .filter(|tail| !tail.is_empty())
        .map(str::to_string)
}

/// Parent directory of a path, empty for top-level entries
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Last segment of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// File name without its final extension
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
