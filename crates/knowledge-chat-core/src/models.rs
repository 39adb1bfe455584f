//! Core data models used throughout Knowledge Chat.
//!
//! These types represent the conversation turns, loaded documents, stored
//! chunk records, and retrieval results that flow through the ingestion and
//! chat pipelines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to a document or chunk record.
///
/// Chunk records always carry `source` and `chunk_index`.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the originating document name.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the zero-based chunk position within its source.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Author of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

impl Role {
    /// Capitalized label used in prompt transcripts (`"User"` / `"Ai"`).
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Ai => "Ai",
        }
    }
}

/// One conversational turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A logical document produced by a [`DocumentLoader`](crate::traits::DocumentLoader).
///
/// A single file may yield several documents (e.g. one per PDF page).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub text: String,
    pub metadata: Metadata,
}

impl LoadedDocument {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// The loader-supplied `source` label, if present and non-empty.
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }
}

/// A unit persisted to the [`VectorIndex`](crate::traits::VectorIndex).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// UUID generated at ingestion time.
    pub id: String,
    pub embedding: Vec<f32>,
    /// The chunk text (not the parent document).
    pub text: String,
    pub metadata: Metadata,
}

/// Candidates returned by a nearest-neighbor query, aligned by position and
/// ordered by ascending distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub distances: Vec<f32>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Read a non-empty string `source` out of a metadata map.
pub fn source_of(metadata: &Metadata) -> Option<&str> {
    metadata
        .get(SOURCE_KEY)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
