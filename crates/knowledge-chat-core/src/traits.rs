//! Capability traits consumed by the pipelines.
//!
//! The ingestion and chat pipelines depend only on these abstractions.
//! The app crate provides one adapter per backing technology (OpenAI,
//! Ollama, fastembed, SQLite, file loaders); tests substitute in-memory
//! fakes.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`DocumentLoader`] | Path → logical documents |
//! | [`Chunker`] | Document text → ordered chunk strings |
//! | [`EmbeddingProvider`] | Texts → dense vectors |
//! | [`VectorIndex`] | Store, query and clear chunk records |
//! | [`TextGenerator`] | Prompt → generated text |

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, LoadedDocument, RetrievalResult};

/// Sampling temperature used when the caller does not configure one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ═══════════════════════════════════════════════════════════════════════
// Ingestion-side capabilities
// ═══════════════════════════════════════════════════════════════════════

/// Loads a file into one or more logical documents.
///
/// Implementations should set a `source` metadata label; the ingestion
/// pipeline falls back to the path when it is missing.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<Vec<LoadedDocument>>;
}

/// Splits document text into an ordered sequence of chunks.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Result<Vec<String>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Model-side capabilities
// ═══════════════════════════════════════════════════════════════════════

/// Trait for embedding providers.
///
/// `embed` returns exactly one vector per input text, in input order, all
/// with the same dimensionality.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// One-shot, stateless text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════════════════

/// Abstract vector index holding the ingested corpus.
///
/// Distances are cosine distances (`1 - cosine similarity`): smaller is
/// closer. Query results are ordered by ascending distance.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append records to the collection.
    async fn add(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Return up to `top_k` nearest records to `embedding`.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<RetrievalResult>;

    /// Irreversibly clear the collection.
    async fn delete_all(&self) -> Result<()>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
