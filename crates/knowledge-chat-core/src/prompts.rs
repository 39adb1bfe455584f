//! Prompt templates and placeholder rendering.
//!
//! Templates use `{name}` placeholders. Rendering is single-pass, so
//! retrieved text or user input that happens to contain `{conversation}`
//! is never expanded a second time.

use anyhow::{bail, Result};

/// Answer prompt. Placeholders: `{context}`, `{conversation}`.
pub const CHAT_PROMPT_TEMPLATE: &str = "You are a helpful and knowledgeable assistant that answers questions \
using a private knowledge base.

IMPORTANT: Respond in the SAME LANGUAGE as the user's question.
- If the user asks in English, respond in English.
- If the user asks in Vietnamese (tiếng Việt), respond in Vietnamese.

Use the retrieved context below to answer the user's question accurately and clearly.
The context may mix English and Vietnamese passages; use whichever parts are relevant.

If the context does not contain the answer, answer from general knowledge,
but say that the specific information was not found in the knowledge base.

Give step-by-step instructions when appropriate, and warn the user before
suggesting anything that changes their system.

--------------------
Context:
{context}
--------------------

Conversation so far:
{conversation}

Now answer the user's latest question.
Be concise, factual, and conversational.
Remember: respond in the SAME LANGUAGE as the user's question.
";

/// Relevance re-rank prompt. Placeholders: `{query}`, `{documents}`.
pub const RERANK_PROMPT_TEMPLATE: &str = "You filter retrieved knowledge-base excerpts for relevance.

Given a user question (in English or Vietnamese) and a numbered list of excerpts,
select the excerpts that are clearly useful for answering the question.
An excerpt counts as relevant if it helps in EITHER language.

Output format:
Respond ONLY with a valid JSON array of 0-based indices.
No explanation, no extra text.

---

### Example

User question:
\"How do I fix Windows blue screen error?\"

Documents:
[0] BLUE SCREEN OF DEATH (BSOD) is a critical error screen. Common causes include faulty RAM, outdated drivers, and hardware issues.
[1] Basketball originated in the late 19th century as an indoor sport.
[2] Màn hình xanh chết chóc (BSOD) xảy ra khi Windows gặp lỗi nghiêm trọng. Nguyên nhân: RAM lỗi, driver cũ, phần cứng hỏng.
[3] The stock market experienced a major decline last week.

Expected output:
[0, 2]

Excerpts [0] and [2] describe BSOD in English and Vietnamese; [1] and [3] are unrelated.

---

### Your input

User question:
\"{query}\"

Documents:
{documents}

Respond ONLY with a JSON array of relevant document indices.
";

/// Placeholders the chat template must contain.
pub const CHAT_PLACEHOLDERS: [&str; 2] = ["context", "conversation"];
/// Placeholders the re-rank template must contain.
pub const RERANK_PLACEHOLDERS: [&str; 2] = ["query", "documents"];

/// The pair of templates a [`ChatPipeline`](crate::ChatPipeline) renders.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub chat: String,
    pub rerank: String,
}

impl PromptTemplates {
    /// Build a template pair, checking that each contains its placeholders.
    pub fn new(chat: impl Into<String>, rerank: impl Into<String>) -> Result<Self> {
        let templates = Self {
            chat: chat.into(),
            rerank: rerank.into(),
        };
        ensure_placeholders("chat", &templates.chat, &CHAT_PLACEHOLDERS)?;
        ensure_placeholders("rerank", &templates.rerank, &RERANK_PLACEHOLDERS)?;
        Ok(templates)
    }

    pub fn render_chat(&self, context: &str, conversation: &str) -> String {
        render(
            &self.chat,
            &[("context", context), ("conversation", conversation)],
        )
    }

    pub fn render_rerank(&self, query: &str, documents: &str) -> String {
        render(&self.rerank, &[("query", query), ("documents", documents)])
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            chat: CHAT_PROMPT_TEMPLATE.to_string(),
            rerank: RERANK_PROMPT_TEMPLATE.to_string(),
        }
    }
}

fn ensure_placeholders(name: &str, template: &str, required: &[&str]) -> Result<()> {
    for key in required {
        if !template.contains(&format!("{{{key}}}")) {
            bail!("{} prompt template is missing the {{{}}} placeholder", name, key);
        }
    }
    Ok(())
}

/// Replace `{name}` placeholders in one left-to-right pass.
///
/// Unknown `{...}` groups and unmatched braces are copied through verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
