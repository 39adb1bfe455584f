//! Application facade over the ingestion and chat pipelines.
//!
//! [`KnowledgeBase`] owns one instance of each pipeline, both sharing the
//! same vector index. A coarse reader/writer lock keeps imports and
//! questions from interleaving: an import takes the write side for its
//! whole clear-and-refill cycle, so no question ever sees a half-built
//! corpus. Questions take the read side and may run concurrently.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use walkdir::WalkDir;

use knowledge_chat_core::chunk::RecursiveCharacterChunker;
use knowledge_chat_core::traits::VectorIndex;
use knowledge_chat_core::{ChatPipeline, IngestionPipeline, Message};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_generator;
use crate::loader::{is_supported, MultiFormatLoader};
use crate::migrate;
use crate::sqlite_index::SqliteIndex;

pub struct KnowledgeBase {
    ingestion: IngestionPipeline,
    chat: ChatPipeline,
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
    lock: RwLock<()>,
}

impl KnowledgeBase {
    /// Assemble a knowledge base from pipelines that share `index`.
    pub fn new(
        ingestion: IngestionPipeline,
        chat: ChatPipeline,
        index: Arc<dyn VectorIndex>,
        default_top_k: usize,
    ) -> Self {
        Self {
            ingestion,
            chat,
            index,
            default_top_k,
            lock: RwLock::new(()),
        }
    }

    /// Wire the configured providers, the SQLite index and the loader.
    ///
    /// Creates the database schema if it does not exist yet.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::new(pool));

        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.llm)?;
        let chunker = RecursiveCharacterChunker::with_separators(
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.chunking.separators.clone(),
        )?;

        let ingestion = IngestionPipeline::new(
            Arc::new(MultiFormatLoader::new()),
            Arc::new(chunker),
            embedder.clone(),
            index.clone(),
        );
        let chat = ChatPipeline::new(embedder.clone(), index.clone(), generator.clone())
            .with_prompts(config.prompts.templates()?)
            .with_temperature(config.llm.temperature)
            .with_rerank_temperature(config.llm.rerank_temperature);

        tracing::debug!(
            embedder = embedder.model_name(),
            generator = generator.model_name(),
            "knowledge base ready"
        );
        Ok(Self::new(ingestion, chat, index, config.retrieval.top_k))
    }

    /// Replace the corpus with `paths`. Returns the number of chunks stored.
    pub async fn import(&self, paths: &[String]) -> knowledge_chat_core::Result<usize> {
        let _guard = self.lock.write().await;
        self.ingestion.invoke(paths).await
    }

    /// Answer the last user turn of `history`.
    pub async fn ask(
        &self,
        history: &[Message],
        top_k: usize,
    ) -> knowledge_chat_core::Result<Message> {
        let _guard = self.lock.read().await;
        self.chat.invoke(history, top_k).await
    }

    pub async fn record_count(&self) -> Result<usize> {
        let _guard = self.lock.read().await;
        self.index.count().await
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }
}

/// A running conversation against a [`KnowledgeBase`].
///
/// The history only ever holds completed exchanges: a failed turn is
/// rolled back, so the next [`send`](ChatSession::send) starts clean.
pub struct ChatSession {
    kb: Arc<KnowledgeBase>,
    history: Vec<Message>,
    top_k: usize,
}

impl ChatSession {
    pub fn new(kb: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self {
            kb,
            history: Vec::new(),
            top_k,
        }
    }

    /// Send a user message and return the assistant's reply.
    pub async fn send(&mut self, text: &str) -> knowledge_chat_core::Result<Message> {
        self.history.push(Message::user(text));
        match self.kb.ask(&self.history, self.top_k).await {
            Ok(reply) => {
                self.history.push(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Expand directories into the supported files beneath them.
///
/// Files named directly are kept as given, whatever their extension, so
/// the loader can report unsupported formats. Files found by walking a
/// directory are filtered to supported extensions and sorted.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            files.extend(walk_supported(path)?);
        } else if path.is_file() {
            files.push(path.to_string_lossy().to_string());
        } else {
            bail!("Path does not exist: {}", path.display());
        }
    }

    Ok(files)
}

fn walk_supported(root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            found.push(entry.path().to_string_lossy().to_string());
        }
    }

    // Sort for deterministic ordering
    found.sort();
    Ok(found)
}
