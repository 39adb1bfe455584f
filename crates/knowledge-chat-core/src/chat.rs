//! Retrieval-augmented chat pipeline.
//!
//! One call answers the latest user turn of a conversation:
//!
//! ```text
//! validate ─▶ embed query ─▶ retrieve top_k ─▶ LLM re-rank ──┬─▶ (nothing relevant) ─▶ fixed notice
//!                                                             └─▶ context ─▶ prompt ─▶ generate ─▶ references
//! ```
//!
//! Stages run strictly in order. The only early exit is the
//! "nothing relevant" notice, which skips context building and the answer
//! generation call. Capability errors propagate unchanged; a malformed
//! re-rank reply is downgraded to "nothing relevant".

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use crate::context::{append_references, build_context, extract_references, format_transcript};
use crate::error::{ChatError, Result};
use crate::models::{Message, RetrievalResult, Role};
use crate::prompts::PromptTemplates;
use crate::relevance::{format_candidates, parse_relevance, select_relevant, RelevantSet};
use crate::traits::{EmbeddingProvider, TextGenerator, VectorIndex, DEFAULT_TEMPERATURE};

/// Number of candidates retrieved when the caller does not choose.
pub const DEFAULT_TOP_K: usize = 3;

/// Deterministic reply when no retrieved candidate is relevant.
pub const NO_RELEVANT_INFO_MESSAGE: &str = "Xin lỗi, tôi không thể tìm thấy thông tin liên quan. \
(I'm sorry, I could not find relevant information in the knowledge base.)";

/// Answers questions against the indexed corpus.
///
/// Holds no per-conversation state: the history is passed in on every
/// call and never mutated, so one pipeline can serve many sessions.
pub struct ChatPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn TextGenerator>,
    prompts: PromptTemplates,
    temperature: f32,
    rerank_temperature: f32,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            prompts: PromptTemplates::default(),
            temperature: DEFAULT_TEMPERATURE,
            rerank_temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// Temperature for the answer generation call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Temperature for the relevance re-rank call.
    pub fn with_rerank_temperature(mut self, temperature: f32) -> Self {
        self.rerank_temperature = temperature;
        self
    }

    /// Answer the last user message of `history` using up to `top_k`
    /// retrieved chunks.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidArgument`] if `history` is empty, its last
    ///   message is not from the user, or `top_k` is zero.
    /// - [`ChatError::Provider`] if embedding, retrieval, or generation fails.
    pub async fn invoke(&self, history: &[Message], top_k: usize) -> Result<Message> {
        let query = validate(history, top_k)?;

        let query_vec = self.embed_query(query).await?;
        let retrieved = self.retrieve(&query_vec, top_k).await?;
        let relevant = self.filter_relevant(query, &retrieved).await?;

        let relevant = match require_relevant(relevant) {
            ControlFlow::Continue(relevant) => relevant,
            ControlFlow::Break(reply) => return Ok(reply),
        };

        self.answer(history, &relevant).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;
        let expected = self.embedder.dims();
        if expected != 0 && vector.len() != expected {
            return Err(anyhow!(
                "Embedding provider {} returned a {}-dim vector, expected {}",
                self.embedder.model_name(),
                vector.len(),
                expected
            )
            .into());
        }
        debug!(dims = vector.len(), "embedded query");
        Ok(vector)
    }

    async fn retrieve(&self, query_vec: &[f32], top_k: usize) -> Result<RetrievalResult> {
        let retrieved = self.index.query(query_vec, top_k).await?;
        debug!(candidates = retrieved.len(), top_k, "retrieved candidates");
        Ok(retrieved)
    }

    /// Ask the generator which candidates matter. Zero candidates skip the
    /// call entirely.
    async fn filter_relevant(&self, query: &str, retrieved: &RetrievalResult) -> Result<RelevantSet> {
        if retrieved.is_empty() {
            return Ok(RelevantSet::default());
        }

        let prompt = self
            .prompts
            .render_rerank(query, &format_candidates(&retrieved.documents));
        let reply = self
            .generator
            .generate(&prompt, self.rerank_temperature)
            .await?;

        let indices = parse_relevance(&reply);
        let relevant = select_relevant(retrieved, &indices);
        debug!(
            candidates = retrieved.len(),
            relevant = relevant.len(),
            "relevance filter applied"
        );
        Ok(relevant)
    }

    async fn answer(&self, history: &[Message], relevant: &RelevantSet) -> Result<Message> {
        let context = build_context(relevant);
        let references = extract_references(relevant);
        let prompt = self
            .prompts
            .render_chat(&context, &format_transcript(history));

        let generated = self.generator.generate(&prompt, self.temperature).await?;
        debug!(references = references.len(), "generated answer");

        Ok(Message::ai(append_references(generated, &references)))
    }
}

/// Check the call's inputs and return the query text.
fn validate(history: &[Message], top_k: usize) -> Result<&str> {
    let last = history
        .last()
        .ok_or_else(|| ChatError::invalid("Message history cannot be empty."))?;
    if last.role() != Role::User {
        return Err(ChatError::invalid("The last message must be from the user."));
    }
    if top_k == 0 {
        return Err(ChatError::invalid("top_k must be at least 1."));
    }
    Ok(last.content())
}

/// Short-circuit with the fixed notice when nothing survived filtering.
fn require_relevant(relevant: RelevantSet) -> ControlFlow<Message, RelevantSet> {
    if relevant.is_empty() {
        debug!("no relevant candidates; returning fixed notice");
        ControlFlow::Break(Message::ai(NO_RELEVANT_INFO_MESSAGE))
    } else {
        ControlFlow::Continue(relevant)
    }
}
