use super::{LlmClient, LlmError, TEMPERATURE, http_client, non_empty, require_http, send};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Local Ollama runtime client (`POST /api/generate`, non-streaming).
pub struct OllamaClient {
    http: Option<Client>,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a client; `base_url` defaults to the local runtime.
    pub fn new(base_url: Option<String>, model: String) -> Self {
        Self {
            http: http_client("pdf-summarizer/ollama"),
            base_url: base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let http = require_http(self.http.as_ref())?;
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": TEMPERATURE },
        });

        let response = send(
            http.post(self.endpoint()).json(&payload),
            "Ollama",
            &self.base_url,
        )
        .await?;

        let body: OllamaResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(LlmError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        non_empty(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "Summary text",
                    "done": true
                }));
            })
            .await;

        let client = OllamaClient::new(Some(server.base_url()), "llama3".into());
        let summary = client.generate("Summarize").await.expect("summary");

        mock.assert();
        assert_eq!(summary, "Summary text");
    }

    #[tokio::test]
    async fn incomplete_response_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({ "response": "partial", "done": false }));
            })
            .await;

        let client = OllamaClient::new(Some(server.base_url()), "llama3".into());
        let error = client.generate("Summarize").await.expect_err("incomplete");
        assert!(matches!(error, LlmError::InvalidResponse(_)));
    }
}
