//! Ingestion pipeline: files → chunks → embeddings → vector index.
//!
//! Every run **replaces** the corpus. The index is cleared before anything
//! else is written, and all chunks from all files are embedded in one
//! provider call so a partially failed import never leaves a mix of old
//! and new records behind the clear.
//!
//! ```text
//! validate ─▶ delete_all ─▶ for each path: load ─▶ chunk ─▶ embed (one batch) ─▶ add (one batch)
//! ```

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::models::{ChunkRecord, Metadata, CHUNK_INDEX_KEY, SOURCE_KEY};
use crate::traits::{Chunker, DocumentLoader, EmbeddingProvider, VectorIndex};

/// Imports files into the vector index, replacing what was there.
pub struct IngestionPipeline {
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

/// A chunk waiting for its embedding.
struct PendingChunk {
    text: String,
    metadata: Metadata,
}

impl IngestionPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            index,
        }
    }

    /// Replace the corpus with the contents of `file_paths`.
    ///
    /// Returns the number of chunk records written.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidArgument`] if `file_paths` is empty.
    /// - [`ChatError::Provider`] for any loader, chunker, embedder, or
    ///   index failure. The index has already been cleared by then.
    pub async fn invoke(&self, file_paths: &[String]) -> Result<usize> {
        if file_paths.is_empty() {
            return Err(ChatError::invalid("file_paths must not be empty."));
        }

        self.index.delete_all().await?;
        debug!("cleared vector index");

        let mut pending: Vec<PendingChunk> = Vec::new();
        for path in file_paths {
            let before = pending.len();
            self.collect_chunks(path, &mut pending).await?;
            debug!(path = %path, chunks = pending.len() - before, "chunked file");
        }

        if pending.is_empty() {
            info!(files = file_paths.len(), "no chunks produced; index left empty");
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )
            .into());
        }

        let records: Vec<ChunkRecord> = pending
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                embedding,
                text: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();

        self.index.add(&records).await?;

        info!(
            files = file_paths.len(),
            chunks = records.len(),
            model = self.embedder.model_name(),
            "import complete"
        );
        Ok(records.len())
    }

    /// Load and chunk one file, appending its chunks to `out`.
    async fn collect_chunks(&self, path: &str, out: &mut Vec<PendingChunk>) -> Result<()> {
        let documents = self.loader.load(path).await?;

        for doc in documents {
            let source = doc.source().unwrap_or(path).to_string();
            for (i, text) in self.chunker.chunk(&doc.text)?.into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.insert(SOURCE_KEY.to_string(), Value::String(source.clone()));
                metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(i));
                out.push(PendingChunk { text, metadata });
            }
        }
        Ok(())
    }
}
