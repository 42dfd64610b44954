use super::{LlmClient, LlmError, TEMPERATURE, http_client, non_empty, require_http, send};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Option<Client>,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    /// Create a client; `base_url` defaults to the public Gemini endpoint.
    pub fn new(base_url: Option<String>, api_key: Option<String>, model: String) -> Self {
        Self {
            http: http_client("pdf-summarizer/gemini"),
            base_url: base_url.unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::ProviderUnavailable("GEMINI_API_KEY is not set".into()))?;
        let http = require_http(self.http.as_ref())?;

        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": TEMPERATURE },
        });

        let response = send(
            http.post(self.endpoint())
                .header("x-goog-api-key", api_key)
                .json(&payload),
            "Gemini",
            &self.base_url,
        )
        .await?;

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode Gemini response: {error}"))
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| LlmError::InvalidResponse("Gemini returned no candidates".into()))?;

        non_empty(text)
    }
}
