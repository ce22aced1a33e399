//! Google Gemini backend (`streamGenerateContent` over SSE).

use super::sse::open_stream;
use super::{FragmentStream, TextGenerator};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const VENDOR: &str = "google";

/// Streams completions from the Gemini REST API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
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
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        VENDOR
    }

    async fn generate(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": { "responseMimeType": "text/plain" }
        });

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        open_stream(VENDOR, request, parse_chunk).await
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
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
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

fn parse_chunk(data: &str) -> Result<Option<String>, GenerationError> {
    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| GenerationError::Decode {
        vendor: VENDOR.to_string(),
        detail: e.to_string(),
    })?;

    if let Some(err) = chunk.error {
        let message = match err.status {
            Some(status) => format!("{status}: {}", err.message),
            None => err.message,
        };
        return Err(GenerationError::Api { message });
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(text).filter(|t| !t.is_empty()))
}
