//! CLI binary for design-guard.
//!
//! A thin shim over the library crate: loads `.env`, maps flags onto
//! `AppConfig`, runs one subcommand and maps the outcome to an exit code
//! (0 success, 1 failure, 2 unusable input path).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use design_guard::convert::Outcome;
use design_guard::pipeline::input::default_output_path;
use design_guard::{
    create_generator, AppConfig, BatchProgressCallback, ConversionError, ConversionReport,
    KnowledgeClient, MarkdownPipeline, PdfAnalyzer, ProgressCallback, QaService, Vendor,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Batch progress bar ───────────────────────────────────────────────────────

/// Terminal progress callback for `batch`: one bar plus a log line per file.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total_files as u64);
        self.bar.set_prefix("Converting");
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(name);
    }

    fn on_file_complete(&self, _index: usize, _total: usize, report: &ConversionReport) {
        let note = match report.outcome {
            Outcome::Refined => String::new(),
            Outcome::FellBack => yellow("unformatted"),
            Outcome::Empty => dim("empty"),
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            report.input.display(),
            dim(&format!("{:>7} bytes", report.final_bytes)),
            note
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, _index: usize, _total: usize, path: &Path, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {}  {}", red("✗"), path.display(), red(first_line)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _converted: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document next to the source (spec.docx → spec.md)
  design-guard convert spec.docx

  # Convert to an explicit path
  design-guard convert deck.pptx -o notes/deck.md

  # Convert a whole folder tree into another folder
  design-guard batch ./docs --output-dir ./markdown --recursive

  # Ask the knowledge base
  design-guard ask "What spacing grid should buttons use?"

  # Check a PDF against the design rules in the knowledge base
  design-guard analyze-pdf mockup-review.pdf --json

ENVIRONMENT VARIABLES (a .env file in the working directory is loaded first):
  AI_VENDOR         google (default) or openai
  GEMINI_API_KEY    Google Gemini API key
  OPENAI_API_KEY    OpenAI API key
  LLM_MODEL         Model override (default gemini-2.0-flash / gpt-4.1-nano)
  GEMINI_BASE_URL   Gemini endpoint override
  OPENAI_BASE_URL   OpenAI-compatible endpoint override
  DIFY_API_KEY      Knowledge base API key (ask, analyze-pdf)
  DIFY_DATASET_ID   Knowledge base dataset id (ask, analyze-pdf)
  DIFY_API_URL      Knowledge base endpoint (default https://api.dify.ai/v1)
  DIFY_TOP_K        Passages per retrieval (default 8)
  MARKITDOWN_BIN    External converter for Office/e-book/audio files (default markitdown)
  PDFIUM_LIB_PATH   Directory or file of the pdfium library (default: system library)
"#;

/// Convert documents to Markdown and check them against a design knowledge base.
#[derive(Parser, Debug)]
#[command(
    name = "design-guard",
    version,
    about = "Convert documents to Markdown and check them against a design knowledge base",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Text generation backend: google or openai.
    #[arg(long, global = true, env = "AI_VENDOR")]
    vendor: Option<String>,

    /// Model ID for the selected vendor.
    #[arg(long, global = true, env = "LLM_MODEL")]
    model: Option<String>,

    /// Ask a vision model to describe image inputs.
    #[arg(long, global = true)]
    describe_images: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable the batch progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document to Markdown.
    Convert {
        /// Source document (PDF, Office, image, text, …).
        input: PathBuf,

        /// Output Markdown file. Default: the input with a `.md` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert every supported document in a directory.
    Batch {
        /// Directory to scan.
        input_dir: PathBuf,

        /// Write outputs here, mirroring the input layout. Default: next to each source.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Descend into subdirectories.
        #[arg(short, long)]
        recursive: bool,
    },

    /// Answer a question from the knowledge base.
    Ask {
        /// The question; several words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Report knowledge-base rules that appear in a PDF.
    AnalyzePdf {
        /// The PDF to analyse.
        input: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // While the batch bar is drawn only warnings get through; the bar
    // already reports every file.
    let bar_active =
        matches!(cli.command, Command::Batch { .. }) && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if bar_active {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            if is_invalid_input(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// True when some error in the chain says the input path is unusable.
fn is_invalid_input(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<ConversionError>()
            .is_some_and(ConversionError::is_invalid_input)
    })
}

fn invalid_input(message: String) -> ExitCode {
    eprintln!("{} {}", red("✘"), message);
    ExitCode::from(2)
}

/// Environment first, then flags on top.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(ref vendor) = cli.vendor {
        config.vendor = vendor.parse::<Vendor>().context("Invalid --vendor")?;
    }
    if let Some(ref model) = cli.model {
        config.model = Some(model.clone());
    }
    if cli.describe_images {
        config.describe_images = true;
    }
    tracing::debug!("{:?}", config);
    Ok(config)
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Command::Convert { input, output } => {
            if !input.is_file() {
                return Ok(invalid_input(format!(
                    "Input file {} does not exist",
                    input.display()
                )));
            }
            let output = output.clone().unwrap_or_else(|| default_output_path(input));
            if !has_md_extension(&output) {
                eprintln!(
                    "{} output file should end in .md, got {}",
                    yellow("⚠"),
                    output.display()
                );
            }

            let config = load_config(cli)?;
            let pipeline = MarkdownPipeline::from_config(&config)
                .context("Cannot set up the conversion pipeline")?;
            let report = pipeline
                .convert_file(input, &output)
                .await
                .with_context(|| format!("Conversion of {} failed", input.display()))?;

            if !cli.quiet {
                eprintln!(
                    "{} Converted {} → {}{}",
                    green("✔"),
                    input.display(),
                    bold(&output.display().to_string()),
                    match report.outcome {
                        Outcome::Refined => String::new(),
                        Outcome::FellBack => yellow("  (formatting skipped: model call failed)"),
                        Outcome::Empty => dim("  (no content)"),
                    }
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Batch {
            input_dir,
            output_dir,
            recursive,
        } => {
            if !input_dir.is_dir() {
                return Ok(invalid_input(format!(
                    "Input directory {} does not exist",
                    input_dir.display()
                )));
            }

            let config = load_config(cli)?;
            let pipeline = MarkdownPipeline::from_config(&config)
                .context("Cannot set up the conversion pipeline")?;

            let progress: Option<ProgressCallback> = if cli.quiet || cli.no_progress {
                None
            } else {
                Some(CliBatchProgress::new() as ProgressCallback)
            };

            let summary = pipeline
                .convert_batch(input_dir, output_dir.as_deref(), *recursive, progress.as_ref())
                .await
                .context("Batch conversion failed")?;

            if !cli.quiet {
                let mark = if summary.is_success() {
                    green("✔")
                } else {
                    yellow("⚠")
                };
                eprintln!(
                    "{} {}/{} files converted  ({} unformatted, {} failed)",
                    mark,
                    bold(&summary.converted.len().to_string()),
                    summary.total(),
                    summary.fell_back(),
                    summary.failed.len()
                );
            }
            for failure in &summary.failed {
                eprintln!("  {} {}: {}", red("✗"), failure.input.display(), failure.error);
            }

            Ok(if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Ask { question } => {
            let question = question.join(" ");
            let config = load_config(cli)?;
            let generator = create_generator(&config).context("Cannot set up text generation")?;
            let knowledge =
                KnowledgeClient::new(&config).context("Cannot set up the knowledge base")?;
            let qa = QaService::new(generator, Arc::new(knowledge));

            let answer = qa
                .answer(&question)
                .await
                .context("Could not answer the question")?;
            println!("{answer}");
            Ok(ExitCode::SUCCESS)
        }

        Command::AnalyzePdf { input, json } => {
            if !input.is_file() {
                return Ok(invalid_input(format!(
                    "Input file {} does not exist",
                    input.display()
                )));
            }

            let config = load_config(cli)?;
            let pipeline = MarkdownPipeline::from_config(&config)
                .context("Cannot set up the conversion pipeline")?;
            let knowledge =
                KnowledgeClient::new(&config).context("Cannot set up the knowledge base")?;
            let analyzer = PdfAnalyzer::new(Arc::new(pipeline), Arc::new(knowledge));

            let report = analyzer
                .analyze(input)
                .await
                .with_context(|| format!("Analysis of {} failed", input.display()))?;

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else {
                println!("{}", report.annotations);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn has_md_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}
