//! OpenAI backend (chat completions with `stream: true`).

use super::sse::open_stream;
use super::{FragmentStream, TextGenerator};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const VENDOR: &str = "openai";

/// Streams completions from an OpenAI-compatible chat endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        VENDOR
    }

    async fn generate(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true
        });

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body);

        open_stream(VENDOR, request, parse_chunk).await
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn parse_chunk(data: &str) -> Result<Option<String>, GenerationError> {
    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| GenerationError::Decode {
        vendor: VENDOR.to_string(),
        detail: e.to_string(),
    })?;

    if let Some(err) = chunk.error {
        return Err(GenerationError::Api {
            message: err.message,
        });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_slash() {
        let g = OpenAiGenerator::new("k", "gpt-4.1-nano", "http://localhost:9/v1/");
        assert_eq!(g.endpoint(), "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn parses_delta_content() {
        let data = r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        assert_eq!(parse_chunk(data).unwrap().as_deref(), Some("Hi"));
    }

    #[test]
    fn role_only_delta_is_skipped() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_chunk(data).unwrap(), None);
        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_chunk(finish).unwrap(), None);
    }

    #[test]
    fn error_payload_is_reported() {
        let data = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        assert!(matches!(
            parse_chunk(data),
            Err(GenerationError::Api { message }) if message == "model not found"
        ));
    }
}
