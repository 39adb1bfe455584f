//! TOML configuration for the `kchat` binary.
//!
//! Every section except `[db]` is optional and falls back to defaults.
//! See `config/kchat.example.toml` for a complete example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_chat_core::chat::DEFAULT_TOP_K;
use knowledge_chat_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS};
use knowledge_chat_core::prompts::{PromptTemplates, CHAT_PROMPT_TEMPLATE, RERANK_PROMPT_TEMPLATE};
use knowledge_chat_core::traits::DEFAULT_TEMPERATURE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}
fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL. Defaults per provider (OpenAI API, local Ollama).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Temperature for answer generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Temperature for the relevance re-rank call.
    #[serde(default = "default_temperature")]
    pub rerank_temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            rerank_temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Optional prompt overrides. Unset fields use the built-in templates.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    #[serde(default)]
    pub chat_template: Option<String>,
    #[serde(default)]
    pub rerank_template: Option<String>,
}

impl PromptsConfig {
    /// Resolve overrides against the built-in templates, validating placeholders.
    pub fn templates(&self) -> Result<PromptTemplates> {
        PromptTemplates::new(
            self.chat_template
                .as_deref()
                .unwrap_or(CHAT_PROMPT_TEMPLATE),
            self.rerank_template
                .as_deref()
                .unwrap_or(RERANK_PROMPT_TEMPLATE),
        )
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.dims.is_none() || embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if embedding.is_enabled() && embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    let llm = &config.llm;
    match llm.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if llm.model.is_none() {
                anyhow::bail!(
                    "llm.model must be specified when provider is '{}'",
                    llm.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    for (name, t) in [
        ("llm.temperature", llm.temperature),
        ("llm.rerank_temperature", llm.rerank_temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            anyhow::bail!("{} must be in [0.0, 2.0]", name);
        }
    }

    // Validate prompt overrides
    config.prompts.templates()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "[db]\npath = \"./data/kchat.sqlite\"\n";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.chunking.separators, vec!["\n\n", "\n", ".", " ", ""]);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.llm.is_enabled());
        assert_eq!(cfg.llm.temperature, 0.7);
        assert_eq!(cfg.embedding.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse_config("[retrieval]\ntop_k = 3\n").is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let toml = format!("{MINIMAL}[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let toml = format!("{MINIMAL}[retrieval]\ntop_k = 0\n");
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_openai_embedding_requires_model_and_dims() {
        let toml = format!("{MINIMAL}[embedding]\nprovider = \"openai\"\n");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let toml = format!(
            "{MINIMAL}[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        );
        assert!(parse_config(&toml).is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let toml = format!("{MINIMAL}[embedding]\nprovider = \"cohere\"\n");
        assert!(parse_config(&toml).is_err());
        let toml = format!("{MINIMAL}[llm]\nprovider = \"gemini\"\nmodel = \"x\"\n");
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_llm_temperature_range() {
        let toml = format!(
            "{MINIMAL}[llm]\nprovider = \"ollama\"\nmodel = \"llama3\"\ntemperature = 3.5\n"
        );
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("llm.temperature"));
    }

    #[test]
    fn test_prompt_override_must_keep_placeholders() {
        let toml = format!("{MINIMAL}[prompts]\nchat_template = \"Answer: {{context}}\"\n");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("{conversation}"));

        let toml = format!(
            "{MINIMAL}[prompts]\nchat_template = \"Context: {{context}}\\nChat: {{conversation}}\"\n"
        );
        let cfg = parse_config(&toml).unwrap();
        let templates = cfg.prompts.templates().unwrap();
        assert_eq!(templates.render_chat("c", "v"), "Context: c\nChat: v");
    }
}
