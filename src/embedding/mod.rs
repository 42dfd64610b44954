//! Embedding client abstraction and HTTP adapters.
//!
//! Vectors are only consumed by the clustering step, so every adapter returns L2-normalized
//! embeddings and the clusterer can treat euclidean distance as a cosine proxy.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const BATCH_SIZE: usize = 64;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or is not configured.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one normalized embedding vector per supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client(config: &Config) -> Box<dyn EmbeddingClient> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new(
            config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            config.embedding_model.clone(),
        )),
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbeddingClient::new(
            config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
        )),
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(embedding: &mut [f32]) {
    let norm = embedding
        .iter()
        .map(|value| value * value)
        .sum::<f32>()
        .sqrt();

    if norm > 0.0 {
        for value in embedding.iter_mut() {
            *value /= norm;
        }
    }
}

fn http_client() -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent("pdf-summarizer/embedding")
        .build()
        .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))
}

fn check_input(texts: &[String]) -> Result<(), EmbeddingClientError> {
    if texts.is_empty() {
        return Err(EmbeddingClientError::GenerationFailed(
            "no texts provided".to_string(),
        ));
    }
    Ok(())
}

async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, EmbeddingClientError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(EmbeddingClientError::GenerationFailed(format!(
        "{provider} returned {status}: {body}"
    )))
}

/// Embeddings served by a local Ollama runtime (`POST /api/embed`).
pub struct OllamaEmbeddingClient {
    http: Option<Client>,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client for the given runtime URL and model.
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            http: http_client().ok(),
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        check_input(&texts)?;
        let http = self.http.as_ref().ok_or_else(|| {
            EmbeddingClientError::ProviderUnavailable("HTTP client failed to initialize".into())
        })?;

        tracing::debug!(
            model = %self.model,
            count = texts.len(),
            "Generating embeddings via Ollama"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let response = http
                .post(self.endpoint())
                .json(&json!({ "model": self.model, "input": batch }))
                .send()
                .await
                .map_err(|error| {
                    EmbeddingClientError::ProviderUnavailable(format!(
                        "failed to reach Ollama at {}: {error}",
                        self.base_url
                    ))
                })?;
            let body: OllamaEmbedResponse = check_status(response, "Ollama")
                .await?
                .json()
                .await
                .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;
            if body.embeddings.len() != batch.len() {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    body.embeddings.len()
                )));
            }
            vectors.extend(body.embeddings);
        }

        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }
}

/// Embeddings served by an OpenAI-compatible endpoint (`POST /v1/embeddings`).
pub struct OpenAiEmbeddingClient {
    http: Option<Client>,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Create a client for the given endpoint, key, and model.
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            http: http_client().ok(),
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        check_input(&texts)?;
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            EmbeddingClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
        })?;
        let http = self.http.as_ref().ok_or_else(|| {
            EmbeddingClientError::ProviderUnavailable("HTTP client failed to initialize".into())
        })?;

        tracing::debug!(
            model = %self.model,
            count = texts.len(),
            "Generating embeddings via OpenAI"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let response = http
                .post(self.endpoint())
                .bearer_auth(api_key)
                .json(&json!({ "model": self.model, "input": batch }))
                .send()
                .await
                .map_err(|error| {
                    EmbeddingClientError::ProviderUnavailable(format!(
                        "failed to reach {}: {error}",
                        self.base_url
                    ))
                })?;
            let mut body: OpenAiEmbeddingResponse = check_status(response, "OpenAI")
                .await?
                .json()
                .await
                .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;
            if body.data.len() != batch.len() {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    body.data.len()
                )));
            }
            body.data.sort_by_key(|item| item.index);
            vectors.extend(body.data.into_iter().map(|item| item.embedding));
        }

        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }
}
