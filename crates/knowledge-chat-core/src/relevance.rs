//! LLM relevance filtering of retrieved candidates.
//!
//! The re-rank step asks the generator for a JSON array of 0-based indices.
//! The model's reply is free-form text, so parsing is total: anything that
//! is not a JSON array degrades to "nothing is relevant" instead of failing
//! the request.

use serde_json::Value;

use crate::models::{Metadata, RetrievalResult};

/// Candidates the model judged relevant, in the order it listed them.
///
/// `documents` and `metadatas` are filtered independently, so they only
/// stay aligned when the index returned aligned arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelevantSet {
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl RelevantSet {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Parse the re-rank reply into candidate indices. Never fails.
///
/// - Not JSON, or JSON that is not an array → empty.
/// - Array elements that are not non-negative integers are skipped.
/// - Duplicates keep their first position, so a reply like `[0, 0]`
///   puts candidate 0 in the context once rather than twice.
///
/// ```rust
/// use knowledge_chat_core::relevance::parse_relevance;
///
/// assert_eq!(parse_relevance("[2, 0]"), vec![2, 0]);
/// assert!(parse_relevance("not json").is_empty());
/// assert!(parse_relevance("{\"indices\": [1]}").is_empty());
/// ```
pub fn parse_relevance(raw: &str) -> Vec<usize> {
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            tracing::warn!(reply = %other, "relevance reply is not a JSON array; treating as empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "relevance reply is not valid JSON; treating as empty");
            return Vec::new();
        }
    };

    let mut indices: Vec<usize> = Vec::with_capacity(items.len());
    for item in items {
        match item.as_u64().and_then(|i| usize::try_from(i).ok()) {
            Some(i) if !indices.contains(&i) => indices.push(i),
            Some(_) => {}
            None => tracing::debug!(item = %item, "skipping non-index relevance entry"),
        }
    }
    indices
}

/// Keep the candidates at `indices`, dropping out-of-bounds positions.
///
/// Each index is checked against `documents` and `metadatas` separately.
pub fn select_relevant(retrieved: &RetrievalResult, indices: &[usize]) -> RelevantSet {
    let documents = indices
        .iter()
        .filter_map(|&i| retrieved.documents.get(i).cloned())
        .collect();
    let metadatas = indices
        .iter()
        .filter_map(|&i| retrieved.metadatas.get(i).cloned())
        .collect();
    RelevantSet {
        documents,
        metadatas,
    }
}

/// Render candidates as the zero-indexed `"[i] <text>"` listing used in the
/// re-rank prompt, separated by blank lines.
pub fn format_candidates(documents: &[String]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {}", i, doc))
        .collect::<Vec<_>>()
        .join("\n\n")
}
