//! Context, transcript, and reference assembly for the answer prompt.

use crate::models::{source_of, Message};
use crate::relevance::RelevantSet;

/// Source label shown in the context block when a candidate has none.
pub const UNKNOWN_SOURCE: &str = "Unknown file";

/// Context block used when no candidate survived filtering.
pub const NO_CONTEXT_MARKER: &str = "No relevant context found.";

/// Render surviving candidates as `"[<source>] <text>"` lines.
pub fn build_context(relevant: &RelevantSet) -> String {
    if relevant.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }

    relevant
        .documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let source = relevant
                .metadatas
                .get(i)
                .and_then(source_of)
                .unwrap_or(UNKNOWN_SOURCE);
            format!("[{}] {}", source, doc)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Unique, non-empty `source` labels in first-seen order.
pub fn extract_references(relevant: &RelevantSet) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in relevant.metadatas.iter().filter_map(source_of) {
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}

/// Render the conversation as `"<Role>: <content>"` lines, oldest first.
pub fn format_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role().label(), m.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append a 1-based `References:` block, or return `answer` unchanged when
/// there are no references.
pub fn append_references(answer: String, references: &[String]) -> String {
    if references.is_empty() {
        return answer;
    }

    let lines = references
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nReferences:\n{}", answer, lines)
}
