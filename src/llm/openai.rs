use super::{LlmClient, LlmError, TEMPERATURE, http_client, non_empty, require_http, send};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Client for OpenAI-compatible `chat/completions` endpoints (OpenAI, Groq, vLLM, ...).
pub struct OpenAiClient {
    http: Option<Client>,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    /// Create a client; `base_url` defaults to the public OpenAI endpoint.
    pub fn new(base_url: Option<String>, api_key: Option<String>, model: String) -> Self {
        Self {
            http: http_client("pdf-summarizer/openai"),
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::ProviderUnavailable("OPENAI_API_KEY is not set".into()))?;
        let http = require_http(self.http.as_ref())?;

        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": TEMPERATURE,
        });

        let response = send(
            http.post(self.endpoint()).bearer_auth(api_key).json(&payload),
            "OpenAI",
            &self.base_url,
        )
        .await?;

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("completion had no choices".into()))?;

        non_empty(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer gsk-test");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": " A summary. " } }]
                }));
            })
            .await;

        let client = OpenAiClient::new(
            Some(server.base_url()),
            Some("gsk-test".into()),
            "llama3-8b-8192".into(),
        );
        let text = client.generate("Summarize").await.expect("completion");

        mock.assert();
        assert_eq!(text, "A summary.");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let client = OpenAiClient::new(Some(server.base_url()), Some("k".into()), "m".into());
        let error = client.generate("Summarize").await.expect_err("429");
        assert!(matches!(
            error,
            LlmError::GenerationFailed(ref message) if message.contains("429")
        ));
    }
}
