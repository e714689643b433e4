use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Provider backend: `ollama`, `openai`, or `disabled`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality. Must match the collection's point size.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
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

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider backend: `ollama` or `openai`. Both speak the
    /// OpenAI-compatible chat-completions wire format.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL of the chat-completions endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    /// Required for the openai provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on tool rounds inside a single turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            api_key_env: None,
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "qwen3:8b".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tool_rounds() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    /// Name of the environment variable holding the Qdrant API key,
    /// if the deployment requires one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key_env: None,
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "ccen-docentes-vetores".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Result limit for the general semantic search tool.
    #[serde(default = "default_general_limit")]
    pub general_limit: u64,
    /// Result limit for person- and type-filtered searches.
    #[serde(default = "default_filtered_limit")]
    pub filtered_limit: u64,
    /// Page size for the directory facet query.
    #[serde(default = "default_directory_limit")]
    pub directory_limit: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            general_limit: default_general_limit(),
            filtered_limit: default_filtered_limit(),
            directory_limit: default_directory_limit(),
        }
    }
}

fn default_general_limit() -> u64 {
    5
}
fn default_filtered_limit() -> u64 {
    10
}
fn default_directory_limit() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Seconds a cached response stays retrievable. Entries older than
    /// this are never returned and are removed by the sweep.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Per-session turn cap; oldest turns are dropped beyond this.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Overall session cap; the least-recently-used session is evicted.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_max_turns() -> usize {
    64
}
fn default_max_sessions() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SpeechConfig {
    /// Whether the `/chat_with_tts` mode is accepted. Synthesis itself is an
    /// external collaborator; with this off, speech requests still answer
    /// with text only.
    #[serde(default)]
    pub enabled: bool,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Startup validation. A misconfiguration here is fatal — the service
/// must not accept traffic with a broken embedding or model setup.
pub fn validate(config: &Config) -> Result<()> {
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "ollama" => {}
        "openai" => {
            let env = config.llm.api_key_env.as_deref().unwrap_or("");
            if env.is_empty() {
                anyhow::bail!("llm.api_key_env is required for the openai provider");
            }
            if std::env::var(env).is_err() {
                anyhow::bail!("environment variable '{}' (llm.api_key_env) not set", env);
            }
        }
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be ollama or openai.", other),
    }

    if config.vector_store.collection.trim().is_empty() {
        anyhow::bail!("vector_store.collection must not be empty");
    }

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    if config.llm.max_tool_rounds == 0 {
        anyhow::bail!("llm.max_tool_rounds must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docent.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_defaults_fill_in() {
        let (_tmp, path) = write_config(
            r#"
[embedding]
provider = "disabled"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(cfg.retrieval.general_limit, 5);
        assert_eq!(cfg.retrieval.filtered_limit, 10);
        assert_eq!(cfg.llm.max_tool_rounds, 4);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let (_tmp, path) = write_config(
            r#"
[embedding]
provider = "ollama"
"#,
        );
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("embedding.model"), "got: {}", err);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_tmp, path) = write_config(
            r#"
[embedding]
provider = "mystery"
model = "m"
dims = 384
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let (_tmp, path) = write_config(
            r#"
[embedding]
provider = "disabled"

[cache]
ttl_secs = 0
"#,
        );
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("ttl_secs"), "got: {}", err);
    }

    #[test]
    fn test_openai_llm_requires_key_env() {
        let (_tmp, path) = write_config(
            r#"
[embedding]
provider = "disabled"

[llm]
provider = "openai"
model = "gpt-4o-mini"
"#,
        );
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("api_key_env"), "got: {}", err);
    }
}
