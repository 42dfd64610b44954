//! Hosted chat-completion clients used by the summarization chains.
//!
//! Each adapter issues HTTP requests directly with `reqwest`. A provider that is missing its
//! API key still builds; the first `generate` call reports `ProviderUnavailable` so the server
//! can start and surface the problem per request.

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// Sampling temperature sent with every request; summaries should be stable.
pub(crate) const TEMPERATURE: f32 = 0.1;

/// Errors surfaced while calling a language model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider was not configured or could not be reached.
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or carried no text.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single user prompt and return the model's text answer.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the LLM client selected by configuration.
pub fn get_llm_client(config: &Config) -> Box<dyn LlmClient> {
    let model = config.llm_model.clone();
    match config.llm_provider {
        LlmProvider::Gemini => Box::new(GeminiClient::new(
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone(),
            model,
        )),
        LlmProvider::OpenAI => Box::new(OpenAiClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            model,
        )),
        LlmProvider::Ollama => Box::new(OllamaClient::new(config.ollama_url.clone(), model)),
    }
}

fn http_client(agent: &str) -> Option<Client> {
    match Client::builder().user_agent(agent).build() {
        Ok(client) => Some(client),
        Err(error) => {
            tracing::error!(error = %error, "Failed to construct HTTP client for LLM provider");
            None
        }
    }
}

fn require_http(http: Option<&Client>) -> Result<&Client, LlmError> {
    http.ok_or_else(|| LlmError::ProviderUnavailable("HTTP client failed to initialize".into()))
}

async fn send(
    request: reqwest::RequestBuilder,
    provider: &str,
    base_url: &str,
) -> Result<reqwest::Response, LlmError> {
    let response = request.send().await.map_err(|error| {
        LlmError::ProviderUnavailable(format!("failed to reach {provider} at {base_url}: {error}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::GenerationFailed(format!(
            "{provider} returned {status}: {body}"
        )));
    }
    Ok(response)
}

fn non_empty(text: String) -> Result<String, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::InvalidResponse("completion was empty".into()));
    }
    Ok(trimmed.to_string())
}
