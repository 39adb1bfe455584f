//! In-memory [`VectorIndex`] implementation for testing and WASM targets.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{check_dims, cosine_distance, rank_nearest};
use crate::models::{ChunkRecord, RetrievalResult};
use crate::traits::VectorIndex;

/// In-memory vector index.
pub struct InMemoryIndex {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Result<Vec<ChunkRecord>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        self.write()?.extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<RetrievalResult> {
        let records = self.read()?;
        let mut scored: Vec<(f32, &ChunkRecord)> = Vec::with_capacity(records.len());
        for record in records.iter() {
            check_dims(embedding.len(), record.embedding.len())?;
            scored.push((cosine_distance(embedding, &record.embedding), record));
        }

        let mut result = RetrievalResult::default();
        for (distance, record) in rank_nearest(scored, top_k) {
            result.documents.push(record.text.clone());
            result.metadatas.push(record.metadata.clone());
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn delete_all(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
