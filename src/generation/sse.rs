//! Shared server-sent-events plumbing for the streaming backends.
//!
//! Both Gemini (`alt=sse`) and OpenAI (`stream: true`) frame their deltas as
//! SSE `data:` lines carrying one JSON object each. `eventsource-stream`
//! handles line buffering and UTF-8 boundaries; each backend only supplies a
//! [`ChunkParser`] that pulls the text out of one payload.

use super::FragmentStream;
use crate::error::GenerationError;
use eventsource_stream::Eventsource;
use futures::future;
use futures::StreamExt;
use tracing::debug;

/// Extract the text delta from one event payload.
///
/// `Ok(None)` means the event carried no text (role-only deltas, usage
/// reports, finish markers) and is skipped.
pub(crate) type ChunkParser = fn(&str) -> Result<Option<String>, GenerationError>;

/// Send `request` and turn the SSE response body into a fragment stream.
///
/// The stream ends on the OpenAI-style `[DONE]` sentinel or when the body
/// ends, and stops right after yielding the first error.
pub(crate) async fn open_stream(
    vendor: &'static str,
    request: reqwest::RequestBuilder,
    parse: ChunkParser,
) -> Result<FragmentStream, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Transport {
            vendor: vendor.to_string(),
            detail: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(match status.as_u16() {
            401 | 403 => GenerationError::Auth {
                vendor: vendor.to_string(),
                detail: format!("HTTP {}: {}", status.as_u16(), body),
            },
            code => GenerationError::Http {
                vendor: vendor.to_string(),
                status: code,
                body,
            },
        });
    }
    debug!("{vendor}: stream opened ({status})");

    let mut failed = false;
    let fragments = response
        .bytes_stream()
        .eventsource()
        .take_while(|event| {
            future::ready(!matches!(event, Ok(e) if e.data.trim() == "[DONE]"))
        })
        .filter_map(move |event| {
            future::ready(match event {
                Ok(event) if event.data.trim().is_empty() => None,
                Ok(event) => parse(&event.data).transpose(),
                Err(e) => Some(Err(GenerationError::Stream {
                    vendor: vendor.to_string(),
                    detail: e.to_string(),
                })),
            })
        })
        .take_while(move |item| {
            let keep = !failed;
            failed = item.is_err();
            future::ready(keep)
        });

    Ok(Box::pin(fragments))
}
