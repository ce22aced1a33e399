//! HTTP-level tests against wiremock servers standing in for Gemini, OpenAI
//! and the Dify retrieval API.

use design_guard::config::Vendor;
use design_guard::error::{ConfigError, GenerationError, RetrievalError};
use design_guard::generation::{collect_text, generate_text, GenerationBridge};
use design_guard::{create_generator, AppConfig, KnowledgeBase, KnowledgeClient};
use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_raw(body, "text/event-stream")
}

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

// ── Gemini ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gemini_stream_yields_text_parts_in_order() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"}]}}]}"#,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"lo"},{"text":","}]}}]}"#,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":" world"}]},"finishReason":"STOP"}]}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "say hello"}]}],
            "generationConfig": {"responseMimeType": "text/plain"}
        })))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let config = AppConfig::from_lookup(lookup(&[
        ("GEMINI_API_KEY", "g-key"),
        ("GEMINI_BASE_URL", &server.uri()),
    ]))
    .unwrap();
    assert_eq!(config.vendor, Vendor::Google);

    let generator = create_generator(&config).unwrap();
    let fragments: Vec<String> = generator
        .generate("say hello")
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(fragments, vec!["Hel", "lo,", " world"]);
}

#[tokio::test]
async fn gemini_error_event_ends_stream_with_error() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"candidates":[{"content":{"parts":[{"text":"partial"}]}}]}"#,
        r#"{"error":{"code":429,"message":"quota exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        r#"{"candidates":[{"content":{"parts":[{"text":"never"}]}}]}"#,
    ]);
    Mock::given(method("POST"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let config = AppConfig::builder()
        .gemini_api_key("k")
        .gemini_base_url(server.uri())
        .build()
        .unwrap();
    let generator = create_generator(&config).unwrap();
    let items: Vec<_> = generator.generate("p").await.unwrap().collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "partial");
    assert!(matches!(&items[1], Err(GenerationError::Api { message }) if message.contains("quota")));
}

#[tokio::test]
async fn auth_failure_is_reported_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let config = AppConfig::builder()
        .gemini_api_key("wrong")
        .gemini_base_url(server.uri())
        .build()
        .unwrap();
    let generator = create_generator(&config).unwrap();
    let err = generate_text(generator.as_ref(), "p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Auth { .. }));
}

// ── OpenAI ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn openai_stream_skips_role_deltas_and_stops_at_done() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
        r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"8px"}}]}"#,
        r#"{"id":"c1","choices":[{"index":0,"delta":{"content":" grid"}}]}"#,
        r#"{"id":"c1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        "[DONE]",
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer o-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4.1-nano",
            "stream": true,
            "messages": [{"role": "user", "content": "which grid?"}]
        })))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let config = AppConfig::from_lookup(lookup(&[
        ("AI_VENDOR", "OpenAI"),
        ("OPENAI_API_KEY", "o-key"),
        ("OPENAI_BASE_URL", &format!("{}/v1", server.uri())),
    ]))
    .unwrap();
    let generator = create_generator(&config).unwrap();
    assert_eq!(generator.name(), "openai");

    let stream = generator.generate("which grid?").await.unwrap();
    assert_eq!(collect_text(stream).await.unwrap(), "8px grid");
}

#[test]
fn blocking_bridge_matches_async_stream() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse_response(sse(&[
                r#"{"choices":[{"delta":{"content":"A"}}]}"#,
                r#"{"choices":[{"delta":{"content":"B"}}]}"#,
                r#"{"choices":[{"delta":{"content":"C"}}]}"#,
                "[DONE]",
            ])))
            .mount(&server)
            .await;
        server
    });

    let config = AppConfig::builder()
        .vendor(Vendor::OpenAi)
        .openai_api_key("k")
        .openai_base_url(server.uri())
        .build()
        .unwrap();
    let generator = create_generator(&config).unwrap();

    let bridge = GenerationBridge::new().unwrap();
    let fragments: Vec<String> = bridge
        .fragments(generator, "p")
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(fragments, vec!["A", "B", "C"]);
}

// ── Fail-fast configuration ──────────────────────────────────────────────────

#[tokio::test]
async fn unknown_vendor_fails_without_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = AppConfig::from_lookup(lookup(&[
        ("AI_VENDOR", "mistral"),
        ("GEMINI_API_KEY", "k"),
        ("GEMINI_BASE_URL", &server.uri()),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedVendor { value } if value == "mistral"));
}

#[tokio::test]
async fn missing_credential_fails_without_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = AppConfig::from_lookup(lookup(&[
        ("AI_VENDOR", "openai"),
        ("OPENAI_API_KEY", "   "),
        ("OPENAI_BASE_URL", &server.uri()),
    ]))
    .unwrap();
    let err = create_generator(&config).err().unwrap();
    assert!(matches!(
        err,
        ConfigError::MissingCredential { variable, .. } if variable == "OPENAI_API_KEY"
    ));
}

// ── Dify retrieval ───────────────────────────────────────────────────────────

#[tokio::test]
async fn retrieval_sends_fixed_hybrid_search_and_parses_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets/ds-1/retrieve"))
        .and(header("authorization", "Bearer dify-key"))
        .and(body_partial_json(json!({
            "query": "button grid",
            "retrieval_model": {
                "search_method": "hybrid_search",
                "reranking_enable": false,
                "top_k": 3,
                "weights": {
                    "weight_type": "customized",
                    "keyword_setting": {"keyword_weight": 0.3},
                    "vector_setting": {"vector_weight": 0.7}
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"content": "button grid"},
            "records": [
                {
                    "segment": {
                        "content": "Buttons snap to an 8px grid",
                        "document": {"id": "d1", "name": "Guide.pdf"}
                    },
                    "score": 0.91,
                    "child_chunks": [{"content": "Icon buttons are 40px"}]
                },
                {"segment": {"content": "Spacing scale"}, "score": 0.42}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AppConfig::from_lookup(lookup(&[
        ("DIFY_API_KEY", "dify-key"),
        ("DIFY_DATASET_ID", "ds-1"),
        ("DIFY_API_URL", &format!("{}/v1", server.uri())),
        ("DIFY_TOP_K", "3"),
    ]))
    .unwrap();
    let client = KnowledgeClient::new(&config).unwrap();
    assert_eq!(client.default_top_k(), 3);

    let records = client.retrieve("button grid", 3).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].document_name(), Some("Guide.pdf"));
    assert_eq!(records[0].child_chunks.len(), 1);
    assert_eq!(records[1].document_name(), None);

    let text = design_guard::format_records(&records);
    assert!(text.contains("Document: Guide.pdf\nScore: 0.9100"));
    assert!(text.contains("Related passages:\n1. Icon buttons are 40px"));
    assert!(text.contains("Document: Unknown document"));
}

#[tokio::test]
async fn retrieval_status_failure_is_distinct_from_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/datasets/empty/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/datasets/broken/retrieve"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = |dataset: &str| {
        let config = AppConfig::builder()
            .dify_api_key("k")
            .dify_dataset_id(dataset)
            .dify_base_url(server.uri())
            .build()
            .unwrap();
        KnowledgeClient::new(&config).unwrap()
    };

    assert!(client("empty").retrieve("q", 8).await.unwrap().is_empty());
    let err = client("broken").retrieve("q", 8).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Http { status: 500, .. }));
}
