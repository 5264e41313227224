//! Turning document bytes into value trees.
//!
//! Parsers follow the same registry discipline as resolvers, with one
//! difference: when no parser matches a document, every parser is tried
//! anyway, in order, as a fallback.
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::{error::BoxError, Error, FileInfo};

/// Trait for parsing document bytes into a value tree.
pub trait Parse: Send + Sync {
    /// Position of this parser among all candidates; lower runs first.
    fn order(&self) -> i32 {
        100
    }
    /// Policy on zero-byte documents. When `false`, the registry fails the
    /// parse with an "empty file" error before this parser runs.
    fn allow_empty(&self) -> bool {
        true
    }
    /// Whether this parser handles the given document.
    fn can_parse(&self, file: &FileInfo) -> bool;
    /// Parse the bytes into a value.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped with the offending URL by the registry.
    fn parse(&self, file: &FileInfo, data: &[u8]) -> Result<Value, BoxError>;
}

/// Select and run a parser: matching candidates first, all of them as a
/// fallback when nothing matched.
pub(crate) fn parse_bytes(
    parsers: &[Arc<dyn Parse>],
    file: &FileInfo,
    data: &[u8],
) -> Result<Value, Error> {
    let mut candidates: Vec<&Arc<dyn Parse>> = parsers
        .iter()
        .filter(|parser| parser.can_parse(file))
        .collect();
    if candidates.is_empty() {
        candidates = parsers.iter().collect();
    }
    candidates.sort_by_key(|parser| parser.order());
    let mut last_error = None;
    for parser in candidates {
        if data.is_empty() && !parser.allow_empty() {
            last_error = Some(Error::parser(file.url().as_str(), "empty file"));
            continue;
        }
        match parser.parse(file, data) {
            Ok(value) => return Ok(value),
            Err(error) => last_error = Some(Error::parser(file.url().as_str(), error)),
        }
    }
    Err(last_error.unwrap_or_else(|| Error::unmatched_parser(file.url().as_str())))
}

/// Parses YAML and JSON documents; the YAML side is restricted to the
/// JSON-compatible schema (no custom tags).
#[derive(Debug, Clone)]
pub struct YamlParser {
    pub order: i32,
    pub allow_empty: bool,
}

impl Default for YamlParser {
    fn default() -> Self {
        Self {
            order: 100,
            allow_empty: true,
        }
    }
}

impl Parse for YamlParser {
    fn order(&self) -> i32 {
        self.order
    }
    fn allow_empty(&self) -> bool {
        self.allow_empty
    }
    fn can_parse(&self, file: &FileInfo) -> bool {
        matches!(file.extension(), ".yaml" | ".yml" | ".json")
    }
    fn parse(&self, file: &FileInfo, data: &[u8]) -> Result<Value, BoxError> {
        if data.is_empty() {
            return Ok(Value::Null);
        }
        if file.extension() == ".json" {
            Ok(serde_json::from_slice(data)?)
        } else {
            Ok(serde_yaml::from_slice(data)?)
        }
    }
}

/// Decodes documents with text-like extensions into a string value.
#[derive(Debug, Clone)]
pub struct TextParser {
    pub order: i32,
    pub allow_empty: bool,
}

impl Default for TextParser {
    fn default() -> Self {
        Self {
            order: 200,
            allow_empty: true,
        }
    }
}

impl Parse for TextParser {
    fn order(&self) -> i32 {
        self.order
    }
    fn allow_empty(&self) -> bool {
        self.allow_empty
    }
    fn can_parse(&self, file: &FileInfo) -> bool {
        matches!(
            file.extension(),
            ".txt" | ".htm" | ".html" | ".md" | ".xml" | ".js" | ".css" | ".csv"
        )
    }
    fn parse(&self, _: &FileInfo, data: &[u8]) -> Result<Value, BoxError> {
        let text = std::str::from_utf8(data)?;
        Ok(Value::String(text.to_string()))
    }
}

/// Catch-all parser keeping unrecognized bytes intact as a base64 string.
#[derive(Debug, Clone)]
pub struct BinaryParser {
    pub order: i32,
    pub allow_empty: bool,
}

impl Default for BinaryParser {
    fn default() -> Self {
        Self {
            order: 300,
            allow_empty: true,
        }
    }
}

impl Parse for BinaryParser {
    fn order(&self) -> i32 {
        self.order
    }
    fn allow_empty(&self) -> bool {
        self.allow_empty
    }
    fn can_parse(&self, _: &FileInfo) -> bool {
        true
    }
    fn parse(&self, _: &FileInfo, data: &[u8]) -> Result<Value, BoxError> {
        Ok(Value::String(STANDARD.encode(data)))
    }
}
