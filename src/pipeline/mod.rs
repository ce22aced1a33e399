//! Document → raw Markdown conversion.
//!
//! Each submodule handles one family of inputs; [`StandardConverter`]
//! dispatches between them on the file extension.
//!
//! ```text
//! input ──▶ extract / text / image / external ──▶ raw Markdown
//! (classify)  (pdfium, csv, vision, markitdown)
//! ```
//!
//! 1. [`input`]    — validate the path and pick a [`DocumentKind`]
//! 2. [`extract`]  — PDF text layer via pdfium, in `spawn_blocking`
//! 3. [`text`]     — verbatim text and CSV → GFM table
//! 4. [`image`]    — image stub plus optional vision-model description
//! 5. [`external`] — the `markitdown` executable for everything else
//!
//! [`postprocess`] is not part of conversion itself: it cleans the output of
//! the formatting model in [`crate::convert`].

pub mod external;
pub mod extract;
pub mod image;
pub mod input;
pub mod postprocess;
pub mod text;

pub use input::DocumentKind;

use crate::config::AppConfig;
use crate::error::ConversionError;
use async_trait::async_trait;
use edgequake_llm::LLMProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Turns a local file into raw (unrefined) Markdown.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn to_markdown(&self, path: &Path) -> Result<String, ConversionError>;
}

/// The built-in converter set.
pub struct StandardConverter {
    markitdown_program: String,
    pdfium_lib_path: Option<PathBuf>,
    captioner: Option<Arc<dyn LLMProvider>>,
}

impl StandardConverter {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            markitdown_program: config.markitdown_program.clone(),
            pdfium_lib_path: config.pdfium_lib_path.clone(),
            captioner: None,
        }
    }

    /// Describe image inputs with this vision provider.
    pub fn with_captioner(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.captioner = Some(provider);
        self
    }
}

#[async_trait]
impl DocumentConverter for StandardConverter {
    async fn to_markdown(&self, path: &Path) -> Result<String, ConversionError> {
        let kind = input::resolve_input(path)?;
        debug!("Converting {} with the {:?} converter", path.display(), kind);

        match kind {
            DocumentKind::Pdf => {
                extract::extract_pdf_text(path, self.pdfium_lib_path.as_deref()).await
            }
            DocumentKind::Text => text::read_text(path).await,
            DocumentKind::Csv => Ok(text::csv_to_markdown(&text::read_text(path).await?)),
            DocumentKind::Image => image::image_to_markdown(path, self.captioner.as_ref()).await,
            DocumentKind::External => {
                external::run_external(&self.markitdown_program, path).await
            }
        }
    }
}
