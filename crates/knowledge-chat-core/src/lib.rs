//! # Knowledge Chat Core
//!
//! Shared, WASM-safe logic for Knowledge Chat: data models, capability
//! traits, chunking, the ingestion pipeline, and the retrieval-augmented
//! chat pipeline.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Concrete loaders, embedders, generators and persistent indexes live in
//! the `knowledge-chat` app crate and plug in through [`traits`].
//!
//! ```text
//!  paths ──▶ IngestionPipeline ──▶ loader ─▶ chunker ─▶ embed (1 batch) ─▶ index
//!
//!  history ─▶ ChatPipeline ─▶ embed ─▶ query ─▶ re-rank ─▶ context ─▶ generate
//!                                                              └─▶ references
//! ```

pub mod chat;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod prompts;
pub mod relevance;
pub mod store;
pub mod traits;

pub use chat::ChatPipeline;
pub use error::{ChatError, Result};
pub use ingest::IngestionPipeline;
pub use models::{ChunkRecord, LoadedDocument, Message, Metadata, RetrievalResult, Role};
