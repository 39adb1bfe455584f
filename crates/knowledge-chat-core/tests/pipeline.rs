//! Pipeline tests against in-process fakes.
//!
//! The fakes record every call so the tests can assert on ordering and on
//! which capabilities were (or were not) touched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use knowledge_chat_core::chat::NO_RELEVANT_INFO_MESSAGE;
use knowledge_chat_core::chunk::RecursiveCharacterChunker;
use knowledge_chat_core::store::InMemoryIndex;
use knowledge_chat_core::traits::{
    Chunker, DocumentLoader, EmbeddingProvider, TextGenerator, VectorIndex,
};
use knowledge_chat_core::{
    ChatPipeline, ChunkRecord, IngestionPipeline, LoadedDocument, Message, Metadata,
    RetrievalResult, Role,
};
use serde_json::json;

// ─── Fakes ──────────────────────────────────────────────────────────

type EventLog = Arc<Mutex<Vec<String>>>;

fn log(events: &EventLog, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

/// Embeds text as a 2-d vector: `[1, 0]` if it mentions "bsod", else `[0, 1]`.
struct KeywordEmbedder {
    calls: Mutex<Vec<usize>>,
    events: EventLog,
    short_by: usize,
}

impl KeywordEmbedder {
    fn new(events: EventLog) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            events,
            short_by: 0,
        }
    }

    fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.len());
        log(&self.events, format!("embed:{}", texts.len()));
        let n = texts.len().saturating_sub(self.short_by);
        Ok(texts
            .iter()
            .take(n)
            .map(|t| {
                if t.to_lowercase().contains("bsod") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding backend unreachable")
    }
}

/// Advertises 3 dims but returns 2-d vectors, like a misconfigured model.
struct MisreportedDimsEmbedder;

#[async_trait]
impl EmbeddingProvider for MisreportedDimsEmbedder {
    fn model_name(&self) -> &str {
        "misreported"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Replays scripted replies and records every prompt it was given.
struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].0.clone()
    }

    fn temperature(&self, i: usize) -> f32 {
        self.prompts.lock().unwrap()[i].1
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))
    }
}

/// Returns the same candidates for every query.
struct FixedIndex {
    result: RetrievalResult,
    queried_top_k: Mutex<Vec<usize>>,
}

impl FixedIndex {
    fn new(candidates: &[(&str, Option<&str>)]) -> Self {
        let mut result = RetrievalResult::default();
        for (i, (text, source)) in candidates.iter().enumerate() {
            result.documents.push(text.to_string());
            let mut metadata = Metadata::new();
            if let Some(s) = source {
                metadata.insert("source".into(), json!(s));
            }
            metadata.insert("chunk_index".into(), json!(0));
            result.metadatas.push(metadata);
            result.distances.push(i as f32 * 0.1);
        }
        Self {
            result,
            queried_top_k: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn add(&self, _records: &[ChunkRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _embedding: &[f32], top_k: usize) -> Result<RetrievalResult> {
        self.queried_top_k.lock().unwrap().push(top_k);
        let mut r = self.result.clone();
        r.documents.truncate(top_k);
        r.metadatas.truncate(top_k);
        r.distances.truncate(top_k);
        Ok(r)
    }

    async fn delete_all(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.result.len())
    }
}

/// Wraps an [`InMemoryIndex`] and logs each mutating call.
struct RecordingIndex {
    inner: InMemoryIndex,
    events: EventLog,
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        log(&self.events, format!("add:{}", records.len()));
        self.inner.add(records).await
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<RetrievalResult> {
        self.inner.query(embedding, top_k).await
    }

    async fn delete_all(&self) -> Result<()> {
        log(&self.events, "delete_all");
        self.inner.delete_all().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Serves file contents from a fixed table keyed by path.
struct TableLoader {
    files: Vec<(&'static str, &'static str, Option<&'static str>)>,
    events: EventLog,
}

#[async_trait]
impl DocumentLoader for TableLoader {
    async fn load(&self, path: &str) -> Result<Vec<LoadedDocument>> {
        log(&self.events, format!("load:{path}"));
        let (_, text, source) = self
            .files
            .iter()
            .find(|(p, _, _)| *p == path)
            .ok_or_else(|| anyhow!("No such file: {path}"))?;
        let mut metadata = Metadata::new();
        if let Some(s) = source {
            metadata.insert("source".into(), json!(s));
        }
        metadata.insert("file_type".into(), json!("text"));
        Ok(vec![LoadedDocument::new(*text, metadata)])
    }
}

fn pipeline(
    index: FixedIndex,
    generator: ScriptedGenerator,
) -> (ChatPipeline, Arc<FixedIndex>, Arc<ScriptedGenerator>) {
    let events = EventLog::default();
    let index = Arc::new(index);
    let generator = Arc::new(generator);
    let chat = ChatPipeline::new(
        Arc::new(KeywordEmbedder::new(events)),
        index.clone(),
        generator.clone(),
    );
    (chat, index, generator)
}

// ─── ChatPipeline ───────────────────────────────────────────────────

#[tokio::test]
async fn test_bsod_answer_with_references() {
    let (chat, index, generator) = pipeline(
        FixedIndex::new(&[
            ("BSOD is a critical error screen caused by drivers.", Some("bsod_en.txt")),
            ("Màn hình xanh (BSOD) do driver cũ gây ra.", Some("bsod_vi.txt")),
            ("Basketball is an indoor sport.", Some("sports.txt")),
        ]),
        ScriptedGenerator::new(&["[0, 1]", "Try updating your drivers."]),
    );

    let history = vec![Message::user("How do I fix a BSOD?")];
    let reply = chat.invoke(&history, 3).await.unwrap();

    assert_eq!(reply.role(), Role::Ai);
    assert_eq!(
        reply.content(),
        "Try updating your drivers.\n\nReferences:\n[1] bsod_en.txt\n[2] bsod_vi.txt"
    );
    assert_eq!(*index.queried_top_k.lock().unwrap(), vec![3]);
    assert_eq!(generator.call_count(), 2);

    let rerank = generator.prompt(0);
    assert!(rerank.contains("\"How do I fix a BSOD?\""));
    assert!(rerank.contains("[0] BSOD is a critical error screen"));
    assert!(rerank.contains("[2] Basketball is an indoor sport."));

    let answer = generator.prompt(1);
    assert!(answer.contains("[bsod_en.txt] BSOD is a critical error screen caused by drivers."));
    assert!(answer.contains("[bsod_vi.txt] Màn hình xanh (BSOD) do driver cũ gây ra."));
    assert!(!answer.contains("Basketball"));
    assert!(answer.contains("User: How do I fix a BSOD?"));
}

#[tokio::test]
async fn test_empty_history_is_invalid() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("doc", Some("a.txt"))]),
        ScriptedGenerator::new(&[]),
    );
    let err = chat.invoke(&[], 3).await.unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_ai_last_history_is_invalid() {
    let (chat, index, _) = pipeline(
        FixedIndex::new(&[("doc", Some("a.txt"))]),
        ScriptedGenerator::new(&[]),
    );
    let history = vec![Message::user("Hi"), Message::ai("Hello!")];
    let err = chat.invoke(&history, 3).await.unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(index.queried_top_k.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_candidates_skips_generator() {
    let (chat, _, generator) = pipeline(FixedIndex::new(&[]), ScriptedGenerator::new(&[]));
    let reply = chat
        .invoke(&[Message::user("anything?")], 3)
        .await
        .unwrap();
    assert_eq!(reply.content(), NO_RELEVANT_INFO_MESSAGE);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_relevance_reply_returns_fixed_notice() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("doc one", Some("a.txt")), ("doc two", Some("b.txt"))]),
        ScriptedGenerator::new(&["not json"]),
    );
    let reply = chat.invoke(&[Message::user("q")], 3).await.unwrap();
    assert_eq!(reply.role(), Role::Ai);
    assert_eq!(reply.content(), NO_RELEVANT_INFO_MESSAGE);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_empty_relevance_array_returns_fixed_notice() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("doc one", Some("a.txt"))]),
        ScriptedGenerator::new(&["[]"]),
    );
    let reply = chat.invoke(&[Message::user("q")], 3).await.unwrap();
    assert_eq!(reply.content(), NO_RELEVANT_INFO_MESSAGE);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_out_of_range_index_is_dropped() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("doc one", Some("a.txt")), ("doc two", Some("b.txt"))]),
        ScriptedGenerator::new(&["[0, 5]", "Answer."]),
    );
    let reply = chat.invoke(&[Message::user("q")], 3).await.unwrap();
    assert_eq!(reply.content(), "Answer.\n\nReferences:\n[1] a.txt");

    let answer = generator.prompt(1);
    assert!(answer.contains("[a.txt] doc one"));
    assert!(!answer.contains("doc two"));
}

#[tokio::test]
async fn test_references_are_deduplicated() {
    let (chat, _, _) = pipeline(
        FixedIndex::new(&[
            ("part one", Some("manual.pdf")),
            ("part two", Some("manual.pdf")),
            ("other", Some("notes.md")),
        ]),
        ScriptedGenerator::new(&["[1, 0, 2]", "Done."]),
    );
    let reply = chat.invoke(&[Message::user("q")], 3).await.unwrap();
    assert_eq!(
        reply.content(),
        "Done.\n\nReferences:\n[1] manual.pdf\n[2] notes.md"
    );
}

#[tokio::test]
async fn test_missing_source_uses_placeholder_without_reference() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("orphan text", None)]),
        ScriptedGenerator::new(&["[0]", "Plain answer."]),
    );
    let reply = chat.invoke(&[Message::user("q")], 3).await.unwrap();
    assert_eq!(reply.content(), "Plain answer.");
    assert!(generator.prompt(1).contains("[Unknown file] orphan text"));
}

#[tokio::test]
async fn test_history_is_rendered_in_order() {
    let (chat, _, generator) = pipeline(
        FixedIndex::new(&[("doc", Some("a.txt"))]),
        ScriptedGenerator::new(&["[0]", "Sure."]),
    );
    let history = vec![
        Message::user("Hi"),
        Message::ai("Hello! How can I help?"),
        Message::user("Tell me about a.txt"),
    ];
    chat.invoke(&history, 1).await.unwrap();

    let prompt = generator.prompt(1);
    assert!(prompt.contains("User: Hi\nAi: Hello! How can I help?\nUser: Tell me about a.txt"));
    // the re-rank prompt only sees the latest question
    assert!(generator.prompt(0).contains("\"Tell me about a.txt\""));
    assert!(!generator.prompt(0).contains("Hello! How can I help?"));
}

#[tokio::test]
async fn test_temperatures_are_applied_per_call() {
    let generator = Arc::new(ScriptedGenerator::new(&["[0]", "ok"]));
    let chat = ChatPipeline::new(
        Arc::new(KeywordEmbedder::new(EventLog::default())),
        Arc::new(FixedIndex::new(&[("doc", Some("a.txt"))])),
        generator.clone(),
    )
    .with_rerank_temperature(0.0)
    .with_temperature(0.3);

    chat.invoke(&[Message::user("q")], 1).await.unwrap();
    assert_eq!(generator.temperature(0), 0.0);
    assert_eq!(generator.temperature(1), 0.3);
}

#[tokio::test]
async fn test_embedding_failure_propagates() {
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let chat = ChatPipeline::new(
        Arc::new(FailingEmbedder),
        Arc::new(FixedIndex::new(&[("doc", Some("a.txt"))])),
        generator.clone(),
    );
    let err = chat.invoke(&[Message::user("q")], 3).await.unwrap_err();
    assert!(!err.is_invalid_argument());
    assert!(err.to_string().contains("embedding backend unreachable"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_query_vector_with_wrong_dims_fails() {
    let index = Arc::new(FixedIndex::new(&[("doc", Some("a.txt"))]));
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let chat = ChatPipeline::new(
        Arc::new(MisreportedDimsEmbedder),
        index.clone(),
        generator.clone(),
    );

    let err = chat.invoke(&[Message::user("q")], 3).await.unwrap_err();
    assert!(!err.is_invalid_argument());
    assert!(err.to_string().contains("returned a 2-dim vector, expected 3"));
    assert!(index.queried_top_k.lock().unwrap().is_empty());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_corpus_from_another_model_is_rejected() {
    let index = Arc::new(InMemoryIndex::new());
    index
        .add(&[ChunkRecord {
            id: "old".into(),
            embedding: vec![1.0, 0.0, 0.0],
            text: "embedded by the previous model".into(),
            metadata: Metadata::new(),
        }])
        .await
        .unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let chat = ChatPipeline::new(
        Arc::new(KeywordEmbedder::new(EventLog::default())),
        index,
        generator.clone(),
    );

    let err = chat.invoke(&[Message::user("bsod?")], 3).await.unwrap_err();
    assert!(err.to_string().contains("dimension mismatch"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let (chat, _, _) = pipeline(
        FixedIndex::new(&[("doc", Some("a.txt"))]),
        ScriptedGenerator::new(&["[0]"]),
    );
    let err = chat.invoke(&[Message::user("q")], 3).await.unwrap_err();
    assert!(err.to_string().contains("no scripted reply left"));
}

// ─── IngestionPipeline ──────────────────────────────────────────────

fn ingestion(
    events: &EventLog,
    embedder: KeywordEmbedder,
) -> (IngestionPipeline, Arc<RecordingIndex>, Arc<KeywordEmbedder>) {
    let loader = TableLoader {
        files: vec![
            ("docs/a.txt", "BSOD means blue screen.\n\nUpdate your drivers.", Some("a.txt")),
            ("docs/b.txt", "Basketball is a sport.", None),
            ("docs/empty.txt", "   ", Some("empty.txt")),
        ],
        events: events.clone(),
    };
    let index = Arc::new(RecordingIndex {
        inner: InMemoryIndex::new(),
        events: events.clone(),
    });
    let embedder = Arc::new(embedder);
    let chunker: Arc<dyn Chunker> = Arc::new(RecursiveCharacterChunker::new(30, 0).unwrap());
    let pipeline = IngestionPipeline::new(Arc::new(loader), chunker, embedder.clone(), index.clone());
    (pipeline, index, embedder)
}

#[tokio::test]
async fn test_ingestion_clears_then_embeds_once() {
    let events = EventLog::default();
    let (pipeline, index, embedder) = ingestion(&events, KeywordEmbedder::new(events.clone()));

    let paths = vec!["docs/a.txt".to_string(), "docs/b.txt".to_string()];
    let written = pipeline.invoke(&paths).await.unwrap();

    assert_eq!(written, 3);
    assert_eq!(embedder.call_sizes(), vec![3]);
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "delete_all",
            "load:docs/a.txt",
            "load:docs/b.txt",
            "embed:3",
            "add:3"
        ]
    );

    let records = index.inner.records().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].text, "BSOD means blue screen.");
    assert_eq!(records[0].metadata["source"], "a.txt");
    assert_eq!(records[0].metadata["chunk_index"], 0);
    assert_eq!(records[1].text, "Update your drivers.");
    assert_eq!(records[1].metadata["chunk_index"], 1);
    assert_eq!(records[1].metadata["file_type"], "text");
    // loader gave no source: fall back to the path
    assert_eq!(records[2].metadata["source"], "docs/b.txt");
    assert_eq!(records[2].metadata["chunk_index"], 0);

    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_ingestion_replaces_previous_corpus() {
    let events = EventLog::default();
    let (pipeline, index, _) = ingestion(&events, KeywordEmbedder::new(events.clone()));

    pipeline.invoke(&["docs/a.txt".to_string()]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);

    pipeline.invoke(&["docs/b.txt".to_string()]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
    let records = index.inner.records().unwrap();
    assert_eq!(records[0].text, "Basketball is a sport.");
}

#[tokio::test]
async fn test_ingestion_with_no_chunks_skips_embedding() {
    let events = EventLog::default();
    let (pipeline, index, embedder) = ingestion(&events, KeywordEmbedder::new(events.clone()));

    let written = pipeline.invoke(&["docs/empty.txt".to_string()]).await.unwrap();
    assert_eq!(written, 0);
    assert!(embedder.call_sizes().is_empty());
    assert_eq!(index.count().await.unwrap(), 0);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["delete_all", "load:docs/empty.txt"]
    );
}

#[tokio::test]
async fn test_ingestion_rejects_empty_paths() {
    let events = EventLog::default();
    let (pipeline, _, _) = ingestion(&events, KeywordEmbedder::new(events.clone()));

    let err = pipeline.invoke(&[]).await.unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ingestion_loader_failure_leaves_index_cleared() {
    let events = EventLog::default();
    let (pipeline, index, embedder) = ingestion(&events, KeywordEmbedder::new(events.clone()));

    pipeline.invoke(&["docs/a.txt".to_string()]).await.unwrap();
    let err = pipeline
        .invoke(&["docs/a.txt".to_string(), "docs/missing.txt".to_string()])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("No such file: docs/missing.txt"));
    assert_eq!(index.count().await.unwrap(), 0);
    assert_eq!(embedder.call_sizes(), vec![2]);
}

#[tokio::test]
async fn test_ingestion_vector_count_mismatch_fails() {
    let events = EventLog::default();
    let mut embedder = KeywordEmbedder::new(events.clone());
    embedder.short_by = 1;
    let (pipeline, index, _) = ingestion(&events, embedder);

    let err = pipeline
        .invoke(&["docs/a.txt".to_string()])
        .await
        .unwrap_err();
    assert!(!err.is_invalid_argument());
    assert!(err.to_string().contains("returned 1 vectors for 2 chunks"));
    assert_eq!(index.count().await.unwrap(), 0);
}

// ─── End to end over the in-memory index ────────────────────────────

#[tokio::test]
async fn test_ingest_then_chat_round_trip() {
    let events = EventLog::default();
    let (ingest, index, embedder) = ingestion(&events, KeywordEmbedder::new(events.clone()));
    ingest
        .invoke(&["docs/a.txt".to_string(), "docs/b.txt".to_string()])
        .await
        .unwrap();

    let generator = Arc::new(ScriptedGenerator::new(&["[0]", "Restart and update drivers."]));
    let chat = ChatPipeline::new(embedder, index, generator.clone());

    let reply = chat
        .invoke(&[Message::user("What is a BSOD?")], 1)
        .await
        .unwrap();
    assert_eq!(
        reply.content(),
        "Restart and update drivers.\n\nReferences:\n[1] a.txt"
    );
    assert!(generator
        .prompt(1)
        .contains("[a.txt] BSOD means blue screen."));
}
