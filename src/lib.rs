//! # Knowledge Chat
//!
//! A local-first knowledge base chat assistant. Import a set of documents,
//! then ask questions about them; answers come back grounded in the
//! imported text with a list of the files they were drawn from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Files     │──▶│ IngestionPipeline │──▶│ SQLite index │
//! │ txt/md/json │   │  chunk + embed    │   │ chunk_records│
//! │    pdf      │   └──────────────────┘   └──────┬───────┘
//! └─────────────┘                                  │
//!                   ┌──────────────────┐           │
//!   question ──────▶│   ChatPipeline   │◀──────────┘
//!                   │ retrieve, rerank │
//!                   │ generate, cite   │──▶ answer + references
//!                   └──────────────────┘
//! ```
//!
//! The pipelines and capability traits live in `knowledge-chat-core`; this
//! crate supplies the concrete adapters and the `kchat` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_index`] | Persistent vector index |
//! | [`loader`] | Multi-format file loading |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Text generation providers |
//! | [`http`] | Retrying JSON-over-HTTP client |
//! | [`knowledge_base`] | Facade, chat sessions, path expansion |

pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod knowledge_base;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod sqlite_index;
