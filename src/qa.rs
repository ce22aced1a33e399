//! Question answering over the knowledge base.
//!
//! Three sequential stages, each a single model or retrieval call:
//!
//! 1. **format**: the model reduces the question to a technical search query;
//! 2. **retrieve**: the query goes to the knowledge base;
//! 3. **answer**: the model answers the *original* question from the
//!    retrieved passages.
//!
//! Retrieval failure is not an error here. It is logged and reported the
//! same way as "nothing found".

use crate::error::QaError;
use crate::generation::{generate_text, TextGenerator};
use crate::knowledge::{format_records, KnowledgeBase};
use crate::prompts;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shown when the model could not turn the question into a query.
pub const UNFORMATTABLE_MESSAGE: &str = "Could not formulate a search query from the question.";
/// Shown when the knowledge base has nothing for the query.
pub const NOT_FOUND_MESSAGE: &str = "No relevant information found in the knowledge base.";

/// What the orchestrator produced for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Generated(String),
    NotFound,
    Unformattable,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Generated(text) => f.write_str(text),
            Answer::NotFound => f.write_str(NOT_FOUND_MESSAGE),
            Answer::Unformattable => f.write_str(UNFORMATTABLE_MESSAGE),
        }
    }
}

pub struct QaService {
    generator: Arc<dyn TextGenerator>,
    knowledge: Arc<dyn KnowledgeBase>,
}

impl QaService {
    pub fn new(generator: Arc<dyn TextGenerator>, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            generator,
            knowledge,
        }
    }

    /// Reduce `question` to a search query. The result is trimmed.
    pub async fn format_question(&self, question: &str) -> Result<String, QaError> {
        let prompt = prompts::simplify_question(question);
        let query = generate_text(self.generator.as_ref(), &prompt)
            .await
            .map_err(|e| {
                error!(error = ?e, "question formatting failed");
                QaError::Format(e)
            })?;
        Ok(query.trim().to_string())
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, QaError> {
        let query = self.format_question(question).await?;
        if query.is_empty() {
            warn!("model returned an empty search query");
            return Ok(Answer::Unformattable);
        }
        info!("Search query: {:?}", query);

        let records = match self
            .knowledge
            .retrieve(&query, self.knowledge.default_top_k())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("knowledge retrieval failed, treating as no match: {}", e);
                Vec::new()
            }
        };
        if records.is_empty() {
            return Ok(Answer::NotFound);
        }

        let knowledge = format_records(&records);
        let prompt = prompts::answer_question(question, &knowledge);
        let text = generate_text(self.generator.as_ref(), &prompt)
            .await
            .map_err(|e| {
                error!(error = ?e, "answer generation failed");
                QaError::Answer(e)
            })?;
        Ok(Answer::Generated(text))
    }
}
