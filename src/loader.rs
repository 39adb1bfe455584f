//! File loaders for the supported document formats.
//!
//! [`MultiFormatLoader`] picks a format by file extension:
//!
//! | Extension | `file_type` | Documents |
//! |-----------|-------------|-----------|
//! | `.txt` | `text` | one |
//! | `.md`, `.markdown` | `markdown` | one |
//! | `.json` | `json` | one, flattened to readable lines |
//! | `.pdf` | `pdf` | one per page |
//!
//! Every document carries `source` (the file name) and `file_type`
//! metadata. PDF pages also carry a zero-based `page`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use thiserror::Error;

use knowledge_chat_core::models::{LoadedDocument, Metadata};
use knowledge_chat_core::traits::DocumentLoader;

/// Extensions accepted by [`MultiFormatLoader`], with the leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = [".txt", ".pdf", ".md", ".markdown", ".json"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file format: {extension}. Supported formats: {supported}", supported = SUPPORTED_EXTENSIONS.join(", "))]
    UnsupportedFormat { extension: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Markdown,
    Json,
    Pdf,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Format::Text),
            "md" | "markdown" => Some(Format::Markdown),
            "json" => Some(Format::Json),
            "pdf" => Some(Format::Pdf),
            _ => None,
        }
    }

    fn file_type(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Pdf => "pdf",
        }
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    Format::from_path(path).is_some()
}

/// Loader that dispatches on file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiFormatLoader;

impl MultiFormatLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for MultiFormatLoader {
    async fn load(&self, path: &str) -> Result<Vec<LoadedDocument>> {
        let p = Path::new(path);
        let format = Format::from_path(p).ok_or_else(|| LoadError::UnsupportedFormat {
            extension: p
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
        })?;

        let source = file_name(path);
        let documents = match format {
            Format::Text | Format::Markdown => {
                let text = read_to_string(path).await?;
                vec![LoadedDocument::new(text, base_metadata(&source, format))]
            }
            Format::Json => {
                let raw = read_to_string(path).await?;
                let data: Value = serde_json::from_str(&raw).map_err(|e| LoadError::Json {
                    path: path.to_string(),
                    source: e,
                })?;
                vec![LoadedDocument::new(
                    flatten_json(&data),
                    base_metadata(&source, format),
                )]
            }
            Format::Pdf => load_pdf(path, &source).await?,
        };

        tracing::debug!(path, documents = documents.len(), file_type = format.file_type(), "loaded file");
        Ok(documents)
    }
}

async fn read_to_string(path: &str) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::Io {
            path: path.to_string(),
            source: e,
        })
}

async fn load_pdf(path: &str, source: &str) -> Result<Vec<LoadedDocument>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| LoadError::Io {
        path: path.to_string(),
        source: e,
    })?;

    let owned_path = path.to_string();
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| LoadError::Pdf {
            path: owned_path,
            message: e.to_string(),
        })
    })
    .await??;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| {
            let mut metadata = base_metadata(source, Format::Pdf);
            metadata.insert("page".into(), json!(page));
            LoadedDocument::new(text, metadata)
        })
        .collect())
}

fn base_metadata(source: &str, format: Format) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), json!(source));
    metadata.insert("file_type".into(), json!(format.file_type()));
    metadata
}

/// Final path component, accepting both `/` and `\` separators.
pub fn file_name(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// Render JSON as indented, human-readable lines.
///
/// - Object entries become `key: value`, or `key:` followed by the nested
///   value one level deeper.
/// - Array items become `- value`, or `Item N:` (1-based) followed by the
///   nested value.
/// - Each nesting level indents by two spaces. Strings are unquoted.
pub fn flatten_json(data: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into(data, 0, &mut lines);
    lines.join("\n")
}

fn flatten_into(data: &Value, indent: usize, lines: &mut Vec<String>) {
    let prefix = "  ".repeat(indent);
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                if is_container(value) {
                    lines.push(format!("{prefix}{key}:"));
                    flatten_into(value, indent + 1, lines);
                } else {
                    lines.push(format!("{prefix}{key}: {}", scalar(value)));
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if is_container(item) {
                    lines.push(format!("{prefix}Item {}:", i + 1));
                    flatten_into(item, indent + 1, lines);
                } else {
                    lines.push(format!("{prefix}- {}", scalar(item)));
                }
            }
        }
        other => lines.push(format!("{prefix}{}", scalar(other))),
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
