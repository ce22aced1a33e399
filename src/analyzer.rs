//! PDF rule analysis.
//!
//! Converts a PDF through the regular conversion pipeline, pulls design rules
//! from the knowledge base and flags every rule whose text appears in the
//! document (case-insensitive substring match). The result is a numbered,
//! human-readable annotation report.
//!
//! Matching is literal; no model is involved after extraction.

use crate::convert::MarkdownPipeline;
use crate::error::AnalysisError;
use crate::knowledge::KnowledgeBase;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Fixed retrieval query for rule lookup.
pub const RULE_QUERY: &str = "design specification rules";
/// Report text when nothing matched.
pub const NO_RULE_ISSUES: &str = "No rule issues found.";
/// Source shown for records without a document name.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

const REPORT_HEADER: &str = "Found the following rule issues:";
const SUGGESTION: &str = "Suggested fix: adjust according to the design specification";

/// A knowledge-base rule found in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleIssue {
    pub rule: String,
    pub source: String,
    pub score: f64,
}

/// Issues plus the rendered annotation text.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub issues: Vec<RuleIssue>,
    pub annotations: String,
}

pub struct PdfAnalyzer {
    pipeline: Arc<MarkdownPipeline>,
    knowledge: Arc<dyn KnowledgeBase>,
}

impl PdfAnalyzer {
    pub fn new(pipeline: Arc<MarkdownPipeline>, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            pipeline,
            knowledge,
        }
    }

    /// Convert `pdf` into a temporary `.md` file and return its contents.
    /// The temporary file is removed when this returns, on every path.
    pub async fn extract_text(&self, pdf: &Path) -> Result<String, AnalysisError> {
        let tmp = tempfile::Builder::new()
            .prefix("design-guard-")
            .suffix(".md")
            .tempfile()
            .map_err(AnalysisError::TempFile)?;
        let tmp_path = tmp.path().to_path_buf();

        self.pipeline
            .convert_file(pdf, &tmp_path)
            .await
            .map_err(|e| {
                error!(error = ?e, "PDF extraction failed for {}", pdf.display());
                AnalysisError::Extraction(e)
            })?;

        let text = tokio::fs::read_to_string(&tmp_path)
            .await
            .map_err(|source| AnalysisError::Read {
                path: tmp_path.clone(),
                source,
            })?;
        drop(tmp);
        Ok(text)
    }

    /// Rules from the knowledge base whose text occurs in `text`.
    ///
    /// A failed retrieval yields no issues; the cause is logged.
    pub async fn analyze_rules(&self, text: &str) -> Vec<RuleIssue> {
        let records = match self
            .knowledge
            .retrieve(RULE_QUERY, self.knowledge.default_top_k())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("rule retrieval failed, reporting no issues: {}", e);
                return Vec::new();
            }
        };

        let haystack = text.to_lowercase();
        let issues: Vec<RuleIssue> = records
            .iter()
            .filter(|r| !r.content().is_empty())
            .filter(|r| haystack.contains(&r.content().to_lowercase()))
            .map(|r| RuleIssue {
                rule: r.content().to_string(),
                source: r.document_name().unwrap_or(UNKNOWN_SOURCE).to_string(),
                score: r.score,
            })
            .collect();

        info!(
            "{} of {} retrieved rules matched the document",
            issues.len(),
            records.len()
        );
        issues
    }

    /// Full run: extract, match, annotate.
    pub async fn analyze(&self, pdf: &Path) -> Result<AnalysisReport, AnalysisError> {
        let text = self.extract_text(pdf).await?;
        let issues = self.analyze_rules(&text).await;
        let annotations = generate_annotations(&issues);
        Ok(AnalysisReport {
            issues,
            annotations,
        })
    }
}

/// Render issues as a numbered report, or [`NO_RULE_ISSUES`] when empty.
pub fn generate_annotations(issues: &[RuleIssue]) -> String {
    if issues.is_empty() {
        return NO_RULE_ISSUES.to_string();
    }

    let mut lines = vec![REPORT_HEADER.to_string()];
    for (i, issue) in issues.iter().enumerate() {
        lines.push(format!(
            "{}. [Source: {}, Relevance: {:.2}]\n   - Issue: {}\n   - {}",
            i + 1,
            issue.source,
            issue.score,
            issue.rule,
            SUGGESTION
        ));
    }
    lines.join("\n")
}
