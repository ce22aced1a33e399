//! Error types for the design-guard library.
//!
//! Each stage of the tool owns one error type so callers can tell *where*
//! a run went wrong without parsing messages:
//!
//! * [`ConfigError`] — credentials or vendor selection are wrong. Always
//!   raised before any network call.
//! * [`GenerationError`] — the LLM backend failed (transport, auth, decode).
//! * [`RetrievalError`] — the knowledge-base endpoint failed.
//! * [`ConversionError`] — a document could not be turned into Markdown or
//!   the output could not be written.
//! * [`QaError`] / [`AnalysisError`] — orchestrator errors naming the stage
//!   that failed and carrying the underlying cause as `source`.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems detected while wiring components together.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `AI_VENDOR` (or `--vendor`) named a backend we do not implement.
    #[error("Unsupported AI provider '{value}'\nSupported: google (gemini), openai.")]
    UnsupportedVendor { value: String },

    /// The selected vendor has no API key configured.
    #[error("No API key configured for provider '{vendor}'.\nSet {variable}=<key> (or add it to .env).")]
    MissingCredential { vendor: String, variable: String },

    /// Knowledge-base retrieval was requested without credentials.
    #[error("Knowledge base is not configured: {variable} is missing.\nSet DIFY_API_KEY and DIFY_DATASET_ID.")]
    MissingKnowledgeBase { variable: String },

    /// A value was present but could not be used.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures from a text-generation backend.
///
/// Any of these aborts the fragment stream; fragments already yielded are
/// left to the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("Request to {vendor} failed: {detail}")]
    Transport { vendor: String, detail: String },

    /// The backend answered with a non-success status.
    #[error("{vendor} returned HTTP {status}: {body}")]
    Http {
        vendor: String,
        status: u16,
        body: String,
    },

    /// The backend rejected the API key (401/403). Not retryable.
    #[error("Authentication error from provider '{vendor}': {detail}")]
    Auth { vendor: String, detail: String },

    /// The server-sent-event framing was broken mid-stream.
    #[error("Stream from {vendor} broke: {detail}")]
    Stream { vendor: String, detail: String },

    /// An event payload was not the JSON we expected.
    #[error("Could not decode {vendor} response chunk: {detail}")]
    Decode { vendor: String, detail: String },

    /// The backend sent an explicit error object inside the stream.
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// The blocking bridge could not start or lost its worker task.
    #[error("Generation bridge failure: {0}")]
    Bridge(String),
}

/// Failures from the knowledge-base retrieval endpoint.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Knowledge base request failed: {0}")]
    Transport(String),

    #[error("Knowledge base returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Knowledge base response could not be decoded: {0}")]
    Decode(String),
}

/// Fatal errors while converting a document to Markdown.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Batch input is not a directory.
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// The output path would overwrite the source document.
    #[error("Refusing to overwrite the input '{path}'; choose another output path.")]
    OutputIsInput { path: PathBuf },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter executable could not be started.
    #[error("Converter '{program}' could not be started: {source}\nInstall it with: pip install 'markitdown[all]' (or set MARKITDOWN_BIN).")]
    ConverterUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external converter exited with a failure status.
    #[error("Converter '{program}' failed on '{path}' ({status}): {stderr}")]
    ConverterFailed {
        program: String,
        path: PathBuf,
        status: String,
        stderr: String,
    },

    /// PDF header/trailer/xref is corrupt, encrypted, or otherwise unreadable.
    #[error("PDF '{path}' could not be read: {detail}")]
    UnreadablePdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
(a directory containing the library or the library file itself).\n"
    )]
    PdfiumBindingFailed(String),

    /// The image could not be decoded.
    #[error("Image '{path}' could not be decoded: {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// Reading the source document failed.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// True when the input path itself is unusable (missing, unreadable,
    /// wrong type). The CLI exits with status 2 for these.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ConversionError::FileNotFound { .. }
                | ConversionError::PermissionDenied { .. }
                | ConversionError::NotAPdf { .. }
                | ConversionError::NotADirectory { .. }
        )
    }
}

/// Question-answering failures, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("Question formatting failed: {0}")]
    Format(#[source] GenerationError),

    #[error("Answer generation failed: {0}")]
    Answer(#[source] GenerationError),
}

/// PDF rule analysis failures.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("PDF text extraction failed: {0}")]
    Extraction(#[source] ConversionError),

    #[error("Could not create a temporary file for extraction: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Could not read extracted text back from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
