//! Knowledge-base retrieval (Dify datasets).
//!
//! [`KnowledgeClient`] issues one `POST /datasets/{id}/retrieve` per query
//! with a fixed hybrid-search configuration (keyword 0.3 / vector 0.7) and
//! returns the records in the order the service ranked them.
//!
//! Failure and "no matches" are distinct here: `retrieve` returns
//! `Err(RetrievalError)` for transport, status and decode failures and
//! `Ok(vec![])` for an empty result. The orchestrators decide how to collapse
//! the two.

use crate::config::AppConfig;
use crate::error::{ConfigError, RetrievalError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Returned by [`format_records`] when there is nothing to show.
pub const NO_KNOWLEDGE_FOUND: &str = "No relevant information found.";

const UNKNOWN_DOCUMENT: &str = "Unknown document";
const NO_CONTENT: &str = "(no content)";

/// Relative weight of keyword matching in hybrid search.
pub const KEYWORD_WEIGHT: f64 = 0.3;
/// Relative weight of vector similarity in hybrid search.
pub const VECTOR_WEIGHT: f64 = 0.7;

/// One retrieved passage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub child_chunks: Vec<ChildChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub document: Option<DocumentRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildChunk {
    #[serde(default)]
    pub content: Option<String>,
}

impl RetrievalRecord {
    /// Convenience constructor, mostly for tests and fixtures.
    pub fn new(document: impl Into<String>, content: impl Into<String>, score: f64) -> Self {
        Self {
            segment: Segment {
                content: Some(content.into()),
                document: Some(DocumentRef {
                    name: Some(document.into()),
                }),
            },
            score,
            child_chunks: Vec::new(),
        }
    }

    /// Passage text, empty when the service sent none.
    pub fn content(&self) -> &str {
        self.segment.content.as_deref().unwrap_or("")
    }

    /// Name of the source document, if the service sent one.
    pub fn document_name(&self) -> Option<&str> {
        self.segment
            .document
            .as_ref()
            .and_then(|d| d.name.as_deref())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ChildChunk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ChildChunk>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    records: Vec<RetrievalRecord>,
}

/// Anything that can answer a retrieval query.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Retrieve up to `top_k` passages for `query`, ranked by the backend.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalRecord>, RetrievalError>;

    /// Default `top_k` for this knowledge base.
    fn default_top_k(&self) -> usize {
        crate::config::DEFAULT_TOP_K
    }
}

/// HTTP client for the Dify dataset retrieval endpoint.
pub struct KnowledgeClient {
    client: reqwest::Client,
    api_key: String,
    dataset_id: String,
    base_url: String,
    top_k: usize,
}

impl KnowledgeClient {
    /// Build a client; fails when the API key or dataset id is missing.
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let knowledge = &config.knowledge;
        let api_key = knowledge
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingKnowledgeBase {
                variable: "DIFY_API_KEY".into(),
            })?;
        let dataset_id = knowledge
            .dataset_id
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingKnowledgeBase {
                variable: "DIFY_DATASET_ID".into(),
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            dataset_id,
            base_url: knowledge.base_url.clone(),
            top_k: knowledge.top_k,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/datasets/{}/retrieve",
            self.base_url.trim_end_matches('/'),
            self.dataset_id
        )
    }
}

/// Request body with the fixed hybrid-search settings.
pub fn retrieval_payload(query: &str, top_k: usize) -> serde_json::Value {
    json!({
        "query": query,
        "retrieval_model": {
            "search_method": "hybrid_search",
            "reranking_enable": false,
            "reranking_mode": "weighted_score",
            "reranking_model": {
                "reranking_provider_name": "",
                "reranking_model_name": ""
            },
            "weights": {
                "weight_type": "customized",
                "keyword_setting": { "keyword_weight": KEYWORD_WEIGHT },
                "vector_setting": {
                    "vector_weight": VECTOR_WEIGHT,
                    "embedding_model_name": "text-embedding-3-large",
                    "embedding_provider_name": "langgenius/openai/openai"
                }
            },
            "top_k": top_k,
            "score_threshold_enabled": false,
            "score_threshold": 0
        }
    })
}

#[async_trait]
impl KnowledgeBase for KnowledgeClient {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalRecord>, RetrievalError> {
        debug!("Retrieving top {} passages for {:?}", top_k, query);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&retrieval_payload(query, top_k))
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;

        info!("Knowledge base returned {} records", body.records.len());
        Ok(body.records)
    }

    fn default_top_k(&self) -> usize {
        self.top_k
    }
}

/// Render records as a human-readable block for prompts and terminals.
///
/// Total over any record shape; missing fields fall back to placeholders.
pub fn format_records(records: &[RetrievalRecord]) -> String {
    if records.is_empty() {
        return NO_KNOWLEDGE_FOUND.to_string();
    }

    let mut blocks: Vec<String> = Vec::new();
    for record in records {
        let name = record.document_name().unwrap_or(UNKNOWN_DOCUMENT);
        let content = record.segment.content.as_deref().unwrap_or(NO_CONTENT);

        blocks.push(format!(
            "Document: {name}\nScore: {:.4}\n\nContent:\n{content}\n",
            record.score
        ));

        let children: Vec<&str> = record
            .child_chunks
            .iter()
            .filter_map(|c| c.content.as_deref())
            .collect();
        if !children.is_empty() {
            blocks.push("Related passages:".to_string());
            for (i, child) in children.iter().enumerate() {
                blocks.push(format!("{}. {}", i + 1, child.trim()));
            }
            blocks.push(String::new());
        }
    }

    blocks.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_fixed_message() {
        assert_eq!(format_records(&[]), NO_KNOWLEDGE_FOUND);
    }

    #[test]
    fn single_record_contains_fields() {
        let out = format_records(&[RetrievalRecord::new("D", "X", 0.5)]);
        assert!(out.contains("D"));
        assert!(out.contains("X"));
        assert!(out.contains("0.5000"));
    }

    #[test]
    fn child_chunks_are_numbered_from_one() {
        let mut record = RetrievalRecord::new("Guide", "main", 0.91234);
        record.child_chunks = vec![
            ChildChunk {
                content: Some("  first  ".into()),
            },
            ChildChunk { content: None },
            ChildChunk {
                content: Some("second".into()),
            },
        ];
        let out = format_records(&[record]);
        assert!(out.contains("Score: 0.9123"));
        assert!(out.contains("Related passages:\n1. first\n2. second"));
    }

    #[test]
    fn missing_fields_use_placeholders() {
        let record: RetrievalRecord = serde_json::from_str("{}").unwrap();
        let out = format_records(&[record]);
        assert!(out.contains(UNKNOWN_DOCUMENT));
        assert!(out.contains(NO_CONTENT));
        assert!(out.contains("0.0000"));
    }

    #[test]
    fn deserializes_service_shape() {
        let json = r#"{
            "query": {"content": "grid"},
            "records": [{
                "segment": {
                    "id": "s1",
                    "content": "Use an 8px grid",
                    "document": {"id": "d1", "name": "Design Spec.pdf"}
                },
                "child_chunks": null,
                "score": 0.87
            }]
        }"#;
        let parsed: RetrieveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let r = &parsed.records[0];
        assert_eq!(r.content(), "Use an 8px grid");
        assert_eq!(r.document_name(), Some("Design Spec.pdf"));
        assert!(r.child_chunks.is_empty());
    }

    #[test]
    fn payload_has_fixed_weights() {
        let p = retrieval_payload("q", 5);
        assert_eq!(p["query"], "q");
        assert_eq!(p["retrieval_model"]["search_method"], "hybrid_search");
        assert_eq!(p["retrieval_model"]["top_k"], 5);
        assert_eq!(
            p["retrieval_model"]["weights"]["keyword_setting"]["keyword_weight"],
            0.3
        );
        assert_eq!(
            p["retrieval_model"]["weights"]["vector_setting"]["vector_weight"],
            0.7
        );
    }

    #[test]
    fn client_requires_credentials() {
        let config = AppConfig::builder().dify_api_key("k").build().unwrap();
        assert!(matches!(
            KnowledgeClient::new(&config),
            Err(ConfigError::MissingKnowledgeBase { variable }) if variable == "DIFY_DATASET_ID"
        ));
        let config = AppConfig::builder().dify_dataset_id("d").build().unwrap();
        assert!(matches!(
            KnowledgeClient::new(&config),
            Err(ConfigError::MissingKnowledgeBase { variable }) if variable == "DIFY_API_KEY"
        ));
    }
}
