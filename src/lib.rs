//! # design-guard
//!
//! Document-to-Markdown conversion, knowledge-base question answering and a
//! rule check for design documents, built on hosted LLMs.
//!
//! ## What it does
//!
//! ```text
//! convert      document ─▶ converter ─▶ raw Markdown ─▶ LLM formatting ─▶ cleanup ─▶ file
//! ask          question ─▶ LLM (query) ─▶ knowledge base ─▶ LLM (answer)
//! analyze-pdf  PDF ─▶ convert ─▶ text ∩ knowledge-base rules ─▶ annotation report
//! ```
//!
//! Converters: pdfium text extraction for PDFs, verbatim text, CSV → GFM
//! table, an image stub (optionally captioned by a vision model), and the
//! external `markitdown` tool for Office documents and the rest.
//!
//! Text generation streams from Google Gemini or OpenAI, picked once from
//! [`config::Vendor`]. Retrieval uses a Dify dataset with a fixed hybrid
//! search.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use design_guard::{AppConfig, MarkdownPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GEMINI_API_KEY (or AI_VENDOR=openai + OPENAI_API_KEY) must be set.
//!     let config = AppConfig::from_env()?;
//!     let pipeline = MarkdownPipeline::from_config(&config)?;
//!     let report = pipeline
//!         .convert_file(Path::new("spec.docx"), Path::new("spec.md"))
//!         .await?;
//!     eprintln!("{:?}: {} bytes", report.outcome, report.final_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Synchronous callers
//!
//! [`generation::GenerationBridge`] runs a generator on its own runtime and
//! exposes the fragments as a blocking iterator.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `design-guard` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyzer;
pub mod config;
pub mod convert;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod qa;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyzer::{AnalysisReport, PdfAnalyzer, RuleIssue};
pub use config::{AppConfig, AppConfigBuilder, Vendor};
pub use convert::{BatchSummary, ConversionReport, MarkdownPipeline, Outcome};
pub use error::{AnalysisError, ConfigError, ConversionError, GenerationError, QaError, RetrievalError};
pub use generation::{create_generator, FragmentStream, GenerationBridge, TextGenerator};
pub use knowledge::{format_records, KnowledgeBase, KnowledgeClient, RetrievalRecord};
pub use pipeline::{DocumentConverter, StandardConverter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use qa::{Answer, QaService};
