//! Input resolution: validate a source path and decide which converter owns it.
//!
//! The decision is made from the file extension alone. PDFs additionally get
//! a magic-byte check (`%PDF`) so a mislabelled file fails with a clear error
//! instead of a pdfium parse failure.

use crate::error::ConversionError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions read verbatim as Markdown or plain text.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "text", "rst", "log", "json", "xml", "yaml", "yml", "html", "htm",
];

/// Extensions handled by the image converter.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extensions delegated to the external `markitdown` executable.
const EXTERNAL_EXTENSIONS: &[&str] = &[
    "docx", "doc", "pptx", "xlsx", "xls", "epub", "msg", "ipynb", "zip", "mp3", "wav", "m4a",
];

/// Which converter handles a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Text extraction through pdfium.
    Pdf,
    /// Read as-is.
    Text,
    /// Rendered as a GFM table.
    Csv,
    /// Markdown stub, optionally captioned by a vision model.
    Image,
    /// Office documents, e-books, audio, …: handed to `markitdown`.
    External,
}

impl DocumentKind {
    /// Classify a path by extension. `None` for unsupported formats.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let ext = ext.as_str();
        if ext == "pdf" {
            Some(DocumentKind::Pdf)
        } else if ext == "csv" {
            Some(DocumentKind::Csv)
        } else if TEXT_EXTENSIONS.contains(&ext) {
            Some(DocumentKind::Text)
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Some(DocumentKind::Image)
        } else if EXTERNAL_EXTENSIONS.contains(&ext) {
            Some(DocumentKind::External)
        } else {
            None
        }
    }
}

/// True when some converter claims `path`'s extension.
pub fn is_supported(path: &Path) -> bool {
    DocumentKind::from_path(path).is_some()
}

/// `input` with its extension replaced by `.md`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

/// Validate that `path` is a readable file and classify it.
///
/// Unknown extensions are routed to [`DocumentKind::External`] so the
/// external converter gets a chance at them.
pub fn resolve_input(path: &Path) -> Result<DocumentKind, ConversionError> {
    if !path.is_file() {
        return Err(ConversionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let kind = DocumentKind::from_path(path).unwrap_or(DocumentKind::External);

    match std::fs::File::open(path) {
        Ok(mut f) => {
            if kind == DocumentKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(ConversionError::NotAPdf {
                        path: path.to_path_buf(),
                        magic,
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConversionError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ConversionError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved {} as {:?}", path.display(), kind);
    Ok(kind)
}
