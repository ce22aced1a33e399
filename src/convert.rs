//! Document → formatted Markdown file.
//!
//! [`MarkdownPipeline`] chains three steps:
//!
//! 1. a [`DocumentConverter`] produces raw Markdown;
//! 2. the raw Markdown is sent to the generation adapter with the fixed
//!    formatting prompt and the fragments are concatenated;
//! 3. the refined text is cleaned up and written atomically.
//!
//! Generation is best-effort: when it fails (or returns nothing) the raw
//! Markdown is written instead and the report says so. Empty raw Markdown
//! skips generation entirely and produces an empty file.

use crate::config::AppConfig;
use crate::error::{ConfigError, ConversionError};
use crate::generation::{create_generator, generate_text, TextGenerator};
use crate::pipeline::image::create_captioner;
use crate::pipeline::input::{default_output_path, is_supported};
use crate::pipeline::postprocess::tidy_markdown;
use crate::pipeline::{DocumentConverter, StandardConverter};
use crate::progress::ProgressCallback;
use crate::prompts;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How the written content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Model-formatted and cleaned.
    Refined,
    /// Generation failed, or the model replied with nothing but whitespace.
    /// Both write the raw converter output; an empty reply never produces
    /// an empty file.
    FellBack,
    /// The converter produced nothing; an empty file was written.
    Empty,
}

/// Result of converting one file.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Bytes of raw converter output.
    pub raw_bytes: usize,
    /// Bytes written to `output`.
    pub final_bytes: usize,
    pub outcome: Outcome,
}

/// A file the batch could not convert.
#[derive(Debug)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: ConversionError,
}

/// Everything a batch run did.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// How many converted files fell back to raw output.
    pub fn fell_back(&self) -> usize {
        self.converted
            .iter()
            .filter(|r| r.outcome == Outcome::FellBack)
            .count()
    }
}

/// Converter + generator, wired together.
pub struct MarkdownPipeline {
    converter: Arc<dyn DocumentConverter>,
    generator: Arc<dyn TextGenerator>,
}

impl MarkdownPipeline {
    pub fn new(converter: Arc<dyn DocumentConverter>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            converter,
            generator,
        }
    }

    /// Built-in converters and the configured vendor.
    ///
    /// Fails fast when the vendor credential is missing. With
    /// `describe_images` the vision provider is created too.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let generator = create_generator(config)?;
        let mut converter = StandardConverter::new(config);
        if config.describe_images {
            converter = converter.with_captioner(create_captioner(config)?);
        }
        Ok(Self::new(Arc::new(converter), generator))
    }

    /// Convert `input` and return the final Markdown without writing it.
    pub async fn convert_to_markdown(
        &self,
        input: &Path,
    ) -> Result<(String, usize, Outcome), ConversionError> {
        let start = Instant::now();
        let raw = self.converter.to_markdown(input).await?;
        let raw_bytes = raw.len();
        debug!(
            "{}: {} bytes of raw Markdown in {:?}",
            input.display(),
            raw_bytes,
            start.elapsed()
        );

        if raw.trim().is_empty() {
            info!("{}: converter produced no content", input.display());
            return Ok((String::new(), raw_bytes, Outcome::Empty));
        }

        let prompt = prompts::format_markdown(&raw);
        match generate_text(self.generator.as_ref(), &prompt).await {
            Ok(text) => {
                let cleaned = tidy_markdown(&text);
                if cleaned.is_empty() {
                    warn!(
                        "{}: {} returned no text; writing unformatted Markdown",
                        input.display(),
                        self.generator.name()
                    );
                    Ok((raw, raw_bytes, Outcome::FellBack))
                } else {
                    Ok((cleaned, raw_bytes, Outcome::Refined))
                }
            }
            Err(e) => {
                warn!(
                    "{}: formatting with {} failed, writing unformatted Markdown: {}",
                    input.display(),
                    self.generator.name(),
                    e
                );
                Ok((raw, raw_bytes, Outcome::FellBack))
            }
        }
    }

    /// Convert `input` and write the result to `output`.
    pub async fn convert_file(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<ConversionReport, ConversionError> {
        if input == output {
            return Err(ConversionError::OutputIsInput {
                path: input.to_path_buf(),
            });
        }
        info!("Converting {} → {}", input.display(), output.display());

        let (content, raw_bytes, outcome) = self.convert_to_markdown(input).await?;
        write_atomic(output, &content).await?;

        Ok(ConversionReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            raw_bytes,
            final_bytes: content.len(),
            outcome,
        })
    }

    /// Convert every supported file under `input_dir`.
    ///
    /// Outputs go next to each source, or mirror the directory layout under
    /// `output_dir` when given. Per-file failures are recorded and the batch
    /// moves on; only an unusable `input_dir` fails the whole call.
    pub async fn convert_batch(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        recursive: bool,
        progress: Option<&ProgressCallback>,
    ) -> Result<BatchSummary, ConversionError> {
        let inputs = collect_inputs(input_dir, recursive)?;
        let jobs: Vec<(PathBuf, PathBuf)> = inputs
            .into_iter()
            .map(|input| {
                let output = batch_output_path(&input, input_dir, output_dir);
                (input, output)
            })
            .filter(|(input, output)| {
                if input == output {
                    debug!("Skipping {}: output would overwrite it", input.display());
                    false
                } else {
                    true
                }
            })
            .collect();

        let total = jobs.len();
        info!("Batch: {} files under {}", total, input_dir.display());
        if let Some(cb) = progress {
            cb.on_batch_start(total);
        }

        let mut summary = BatchSummary::default();
        for (i, (input, output)) in jobs.into_iter().enumerate() {
            let index = i + 1;
            if let Some(cb) = progress {
                cb.on_file_start(index, total, &input);
            }
            match self.convert_file(&input, &output).await {
                Ok(report) => {
                    if let Some(cb) = progress {
                        cb.on_file_complete(index, total, &report);
                    }
                    summary.converted.push(report);
                }
                Err(error) => {
                    warn!("{}: {}", input.display(), error);
                    if let Some(cb) = progress {
                        cb.on_file_error(index, total, &input, &error.to_string());
                    }
                    summary.failed.push(BatchFailure { input, error });
                }
            }
        }

        if let Some(cb) = progress {
            cb.on_batch_complete(summary.converted.len(), summary.failed.len());
        }
        info!(
            "Batch done: {} converted ({} unformatted), {} failed",
            summary.converted.len(),
            summary.fell_back(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

/// Supported files directly in `dir` (or below it when `recursive`), sorted.
pub fn collect_inputs(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ConversionError> {
    if !dir.is_dir() {
        return Err(ConversionError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut inputs = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    Ok(inputs)
}

/// Where a batch input's Markdown goes.
pub fn batch_output_path(input: &Path, input_dir: &Path, output_dir: Option<&Path>) -> PathBuf {
    let next_to_source = default_output_path(input);
    match output_dir {
        Some(out) => match next_to_source.strip_prefix(input_dir) {
            Ok(relative) => out.join(relative),
            Err(_) => out.join(next_to_source.file_name().unwrap_or_default()),
        },
        None => next_to_source,
    }
}

/// Write `content` to `path` via a sibling temp file and a rename.
/// Parent directories are created as needed.
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), ConversionError> {
    let write_err = |source| ConversionError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, content).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outputs_mirror_layout() {
        let out = batch_output_path(
            Path::new("/in/specs/a.docx"),
            Path::new("/in"),
            Some(Path::new("/out")),
        );
        assert_eq!(out, PathBuf::from("/out/specs/a.md"));
        let beside = batch_output_path(Path::new("/in/a.pdf"), Path::new("/in"), None);
        assert_eq!(beside, PathBuf::from("/in/a.md"));
    }

    #[test]
    fn collect_respects_depth_and_support() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.csv"), "a").unwrap();
        std::fs::write(dir.path().join("skip.exe"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let flat = collect_inputs(dir.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.txt"]);

        assert_eq!(collect_inputs(dir.path(), true).unwrap().len(), 3);
    }

    #[test]
    fn collect_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();
        assert!(matches!(
            collect_inputs(&file, false),
            Err(ConversionError::NotADirectory { .. })
        ));
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("er").join("out.md");
        write_atomic(&path, "# Done\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Done\n");
        assert!(!path.with_file_name("out.md.tmp").exists());
    }

    #[test]
    fn summary_counts() {
        let mut s = BatchSummary::default();
        s.converted.push(ConversionReport {
            input: "a".into(),
            output: "a.md".into(),
            raw_bytes: 1,
            final_bytes: 1,
            outcome: Outcome::FellBack,
        });
        s.failed.push(BatchFailure {
            input: "b".into(),
            error: ConversionError::Internal("x".into()),
        });
        assert_eq!(s.total(), 2);
        assert_eq!(s.fell_back(), 1);
        assert!(!s.is_success());
    }
}
