use crate::processing::ChainType;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_SERVER_PORT: u16 = 5000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_CHUNK_SIZE: usize = 2000;
const DEFAULT_CLUSTER_COUNT: usize = 5;
const DEFAULT_CLUSTER_SEED: u64 = 42;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the summarizer server and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding uploaded PDFs.
    pub upload_dir: PathBuf,
    /// Port the HTTP server listens on.
    pub server_port: u16,
    /// Upper bound on request bodies accepted by `POST /upload`.
    pub max_upload_bytes: usize,
    /// Embedding provider used to vectorize chunks for clustering.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Hosted model used by the summarization chain.
    pub llm_provider: LlmProvider,
    /// Model identifier passed to the LLM provider.
    pub llm_model: String,
    /// API key for Google Gemini.
    pub gemini_api_key: Option<String>,
    /// Optional override for the Gemini endpoint.
    pub gemini_base_url: Option<String>,
    /// API key for OpenAI-compatible endpoints (OpenAI, Groq, ...).
    pub openai_api_key: Option<String>,
    /// Optional override for the OpenAI-compatible endpoint.
    pub openai_base_url: Option<String>,
    /// Optional override for the Ollama runtime URL.
    pub ollama_url: Option<String>,
    /// Maximum chunk length, measured in `text_splitter_length_unit`.
    pub text_splitter_chunk_size: usize,
    /// Overlap carried between consecutive chunks.
    pub text_splitter_chunk_overlap: usize,
    /// How chunk length is measured.
    pub text_splitter_length_unit: LengthUnit,
    /// Number of clusters the chunk set is reduced to.
    pub cluster_count: usize,
    /// Seed for k-means initialization.
    pub cluster_seed: u64,
    /// Return cluster representatives in document order instead of cluster order.
    pub cluster_sorted: bool,
    /// Chain strategy used for summaries.
    pub summary_chain_type: ChainType,
    /// Strategy retried once when the primary chain fails.
    pub summary_fallback_chain_type: Option<ChainType>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini `generateContent` API.
    Gemini,
    /// OpenAI-compatible `chat/completions` API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Unit used to measure chunk length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    /// Unicode scalar values.
    Chars,
    /// BPE tokens counted with `tiktoken`.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            max_upload_bytes: positive(
                parse_or(
                    get("MAX_UPLOAD_BYTES"),
                    "MAX_UPLOAD_BYTES",
                    DEFAULT_MAX_UPLOAD_BYTES,
                )?,
                "MAX_UPLOAD_BYTES",
            )?,
            embedding_provider: parse_or(
                get("EMBEDDING_PROVIDER"),
                "EMBEDDING_PROVIDER",
                EmbeddingProvider::Ollama,
            )?,
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            llm_provider: parse_or(get("LLM_PROVIDER"), "LLM_PROVIDER", LlmProvider::Gemini)?,
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            ollama_url: get("OLLAMA_URL"),
            text_splitter_chunk_size: parse_or(
                get("TEXT_SPLITTER_CHUNK_SIZE"),
                "TEXT_SPLITTER_CHUNK_SIZE",
                DEFAULT_CHUNK_SIZE,
            )?,
            text_splitter_chunk_overlap: parse_or(
                get("TEXT_SPLITTER_CHUNK_OVERLAP"),
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                0,
            )?,
            text_splitter_length_unit: parse_or(
                get("TEXT_SPLITTER_LENGTH_UNIT"),
                "TEXT_SPLITTER_LENGTH_UNIT",
                LengthUnit::Chars,
            )?,
            cluster_count: positive(
                parse_or(get("CLUSTER_COUNT"), "CLUSTER_COUNT", DEFAULT_CLUSTER_COUNT)?,
                "CLUSTER_COUNT",
            )?,
            cluster_seed: parse_or(get("CLUSTER_SEED"), "CLUSTER_SEED", DEFAULT_CLUSTER_SEED)?,
            cluster_sorted: parse_or(get("CLUSTER_SORTED"), "CLUSTER_SORTED", false)?,
            summary_chain_type: parse_or(
                get("SUMMARY_CHAIN_TYPE"),
                "SUMMARY_CHAIN_TYPE",
                ChainType::Refine,
            )?,
            summary_fallback_chain_type: get("SUMMARY_FALLBACK_CHAIN_TYPE")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("SUMMARY_FALLBACK_CHAIN_TYPE".to_string())
                    })
                })
                .transpose()?,
        })
    }
}

/// Zero is never a usable count or limit.
fn positive(value: usize, key: &str) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for LengthUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        upload_dir = %config.upload_dir.display(),
        server_port = config.server_port,
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        llm_model = %config.llm_model,
        chain_type = %config.summary_chain_type,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.text_splitter_chunk_size, 2000);
        assert_eq!(config.text_splitter_chunk_overlap, 0);
        assert_eq!(config.text_splitter_length_unit, LengthUnit::Chars);
        assert_eq!(config.cluster_count, 5);
        assert_eq!(config.cluster_seed, 42);
        assert_eq!(config.summary_chain_type, ChainType::Refine);
        assert_eq!(config.llm_provider, LlmProvider::Gemini);
        assert_eq!(config.llm_model, "gemini-2.0-flash");
        assert!(config.summary_fallback_chain_type.is_none());
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("UPLOAD_DIR", "/tmp/docs"),
            ("SERVER_PORT", "8080"),
            ("EMBEDDING_PROVIDER", "OpenAI"),
            ("LLM_PROVIDER", "openai"),
            ("LLM_MODEL", "llama3-8b-8192"),
            ("TEXT_SPLITTER_LENGTH_UNIT", "tokens"),
            ("CLUSTER_COUNT", "3"),
            ("CLUSTER_SORTED", "true"),
            ("SUMMARY_CHAIN_TYPE", "map-reduce"),
            ("SUMMARY_FALLBACK_CHAIN_TYPE", "stuff"),
        ]))
        .expect("config");

        assert_eq!(config.upload_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.embedding_provider, EmbeddingProvider::OpenAI);
        assert_eq!(config.llm_provider, LlmProvider::OpenAI);
        assert_eq!(config.llm_model, "llama3-8b-8192");
        assert_eq!(config.text_splitter_length_unit, LengthUnit::Tokens);
        assert_eq!(config.cluster_count, 3);
        assert!(config.cluster_sorted);
        assert_eq!(config.summary_chain_type, ChainType::MapReduce);
        assert_eq!(config.summary_fallback_chain_type, Some(ChainType::Stuff));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("SERVER_PORT", "  ")])).expect("config");
        assert_eq!(config.server_port, 5000);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let error = Config::from_lookup(lookup(&[("CLUSTER_COUNT", "many")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "CLUSTER_COUNT"));

        let error = Config::from_lookup(lookup(&[("SUMMARY_CHAIN_TYPE", "bogus")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "SUMMARY_CHAIN_TYPE"));
    }

    #[test]
    fn zero_cluster_count_and_upload_limit_are_rejected() {
        let error = Config::from_lookup(lookup(&[("CLUSTER_COUNT", "0")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "CLUSTER_COUNT"));

        let error = Config::from_lookup(lookup(&[("MAX_UPLOAD_BYTES", "0")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key) if key == "MAX_UPLOAD_BYTES"));
    }
}
