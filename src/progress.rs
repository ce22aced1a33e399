//! Progress-callback trait for batch conversion events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::convert::MarkdownPipeline::convert_batch`] to be told about each
//! file as the batch runs. The CLI drives an `indicatif` bar from it; library
//! callers can forward the events anywhere.
//!
//! # Example
//!
//! ```rust
//! use design_guard::progress::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountFailures(AtomicUsize);
//!
//! impl BatchProgressCallback for CountFailures {
//!     fn on_file_error(&self, _index: usize, _total: usize, path: &Path, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}: {}", path.display(), error);
//!     }
//! }
//! ```

use crate::convert::ConversionReport;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch runner as it works through a directory.
///
/// Files are converted one at a time, so calls never overlap. All methods
/// default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the input directory has been scanned.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is converted. `index` is 1-based.
    fn on_file_start(&self, index: usize, total_files: usize, path: &Path) {
        let _ = (index, total_files, path);
    }

    /// Called when a file was written.
    fn on_file_complete(&self, index: usize, total_files: usize, report: &ConversionReport) {
        let _ = (index, total_files, report);
    }

    /// Called when a file failed; the batch continues with the next one.
    fn on_file_error(&self, index: usize, total_files: usize, path: &Path, error: &str) {
        let _ = (index, total_files, path, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, converted: usize, failed: usize) {
        let _ = (converted, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Shared handle to a progress callback.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
