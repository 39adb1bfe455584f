//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Vectors are stored as little-endian `f32` BLOBs in `chunk_records` and
//! ranked by brute-force cosine distance at query time. The table is
//! created by [`migrate::run_migrations`](crate::migrate::run_migrations).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use knowledge_chat_core::embedding::{
    blob_to_vec, check_dims, cosine_distance, rank_nearest, vec_to_blob,
};
use knowledge_chat_core::models::{ChunkRecord, Metadata, RetrievalResult};
use knowledge_chat_core::traits::VectorIndex;

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunk_records (id, text, metadata_json, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .bind(record.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert chunk record {}", record.id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<RetrievalResult> {
        let rows = sqlx::query(
            "SELECT text, metadata_json, embedding, dims FROM chunk_records ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, (String, Metadata))> = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row.get("text");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            let dims: i64 = row.get("dims");
            check_dims(embedding.len(), dims as usize)?;

            let metadata: Metadata = serde_json::from_str(&metadata_json)
                .with_context(|| "Corrupt metadata_json in chunk_records")?;
            let distance = cosine_distance(embedding, &blob_to_vec(&blob));
            scored.push((distance, (text, metadata)));
        }

        let mut result = RetrievalResult::default();
        for (distance, (text, metadata)) in rank_nearest(scored, top_k) {
            result.documents.push(text);
            result.metadatas.push(metadata);
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn delete_all(&self) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM chunk_records")
            .execute(&self.pool)
            .await?
            .rows_affected();
        tracing::debug!(deleted, "cleared chunk_records");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
