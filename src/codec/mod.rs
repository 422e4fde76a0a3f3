//! Format codec registry (C1).
//!
//! A codec is a pair of `encode`/`decode` functions between [`Value`] and
//! text, together with the file extensions it claims. The registry resolves
//! a codec from a file path's extension; when two codecs claim the same
//! extension, the last one registered wins and a warning is logged.

mod hjson;
mod json;
mod json5;
mod jsonl;
mod prose;
mod toml;
mod toon;
mod yaml;

use std::path::Path;

use tracing::warn;

use crate::error::{SerializationError, UnsupportedFormatError};
use crate::value::Value;

/// The eight built-in format families (the ninth, `.jsonc`, shares the
/// json5 codec's lenient parser) plus the bespoke prose template format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json5`
    Json5,
    /// `.jsonc`
    Jsonc,
    /// `.jsonl`, one record per line
    Jsonl,
    /// `.hjson`
    Hjson,
    /// `.toon`
    Toon,
    /// `.prose`, §4.10
    Prose,
}

impl Format {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Json => &["json"],
            Format::Yaml => &["yaml", "yml"],
            Format::Toml => &["toml"],
            Format::Json5 => &["json5"],
            Format::Jsonc => &["jsonc"],
            Format::Jsonl => &["jsonl"],
            Format::Hjson => &["hjson"],
            Format::Toon => &["toon"],
            Format::Prose => &["prose"],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
            Format::Json5 => "json5",
            Format::Jsonc => "jsonc",
            Format::Jsonl => "jsonl",
            Format::Hjson => "hjson",
            Format::Toon => "toon",
            Format::Prose => "prose",
        }
    }

    fn encode(self, value: &Value) -> Result<String, SerializationError> {
        match self {
            Format::Json => json::encode(value),
            Format::Yaml => yaml::encode(value),
            Format::Toml => toml::encode(value),
            Format::Json5 | Format::Jsonc => json5::encode(value),
            Format::Jsonl => jsonl::encode(value),
            Format::Hjson => hjson::encode(value),
            Format::Toon => toon::encode(value),
            Format::Prose => prose::encode(value),
        }
    }

    fn decode(self, text: &str) -> Result<Value, SerializationError> {
        match self {
            Format::Json => json::decode(text),
            Format::Yaml => yaml::decode(text),
            Format::Toml => toml::decode(text),
            Format::Json5 | Format::Jsonc => json5::decode(text),
            Format::Jsonl => jsonl::decode(text),
            Format::Hjson => hjson::decode(text),
            Format::Toon => toon::decode(text),
            Format::Prose => prose::decode(text),
        }
    }
}

/// Maps file extensions to their codec and dispatches encode/decode.
pub struct CodecRegistry {
    /// (extension, format) pairs in registration order; later entries for
    /// the same extension shadow earlier ones.
    bindings: Vec<(&'static str, Format)>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtin_formats()
    }
}

impl CodecRegistry {
    /// Builds a registry with all nine built-in formats registered.
    pub fn with_builtin_formats() -> Self {
        let mut registry = Self { bindings: Vec::new() };
        for format in [
            Format::Json,
            Format::Yaml,
            Format::Toml,
            Format::Json5,
            Format::Jsonc,
            Format::Jsonl,
            Format::Hjson,
            Format::Toon,
            Format::Prose,
        ] {
            registry.register(format);
        }
        registry
    }

    /// Registers a format's extensions, logging a warning for any extension
    /// that was already claimed by a previously registered format.
    pub fn register(&mut self, format: Format) {
        for ext in format.extensions() {
            if let Some((_, existing)) = self.bindings.iter().find(|(e, _)| e == ext) {
                warn!(extension = ext, previous = existing.name(), new = format.name(), "codec extension override");
            }
            self.bindings.retain(|(e, _)| e != ext);
            self.bindings.push((ext, format));
        }
    }

    /// Resolves the codec claiming `ext` (case-insensitive, no leading dot).
    pub fn resolve(&self, ext: &str) -> Result<Format, UnsupportedFormatError> {
        let lower = ext.to_ascii_lowercase();
        self.bindings
            .iter()
            .find(|(e, _)| *e == lower)
            .map(|(_, f)| *f)
            .ok_or_else(|| {
                let mut supported: Vec<String> =
                    self.bindings.iter().map(|(e, _)| e.to_string()).collect();
                supported.sort();
                supported.dedup();
                UnsupportedFormatError::new(ext, supported)
            })
    }

    /// Resolves the codec for a file path's final extension.
    pub fn resolve_path(&self, path: &Path) -> Result<Format, UnsupportedFormatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        self.resolve(ext)
    }

    /// Encodes a value with the given format.
    pub fn encode(&self, format: Format, value: &Value) -> Result<String, SerializationError> {
        format.encode(value)
    }

    /// Decodes text with the given format.
    pub fn decode(&self, format: Format, text: &str) -> Result<Value, SerializationError> {
        format.decode(text)
    }
}
