//! CLI binary for manimator.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use manimator::source::{mime_from_path, read_source};
use manimator::{
    GenerationRequest, Pipeline, PipelineConfig, PipelineObserver, PipelineResult, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Spinner that follows the chain stage by stage and logs failed attempts.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Preparing");
        bar.set_message("reading input");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        self.bar
            .set_prefix(format!("Attempt {attempt}/{max_attempts}"));
    }

    fn on_stage_start(&self, stage: Stage, _attempt: u32) {
        let msg = match stage {
            Stage::Normalize => "preparing input",
            Stage::SceneSynthesis => "writing storyboard",
            Stage::CodeSynthesis => "generating Manim code",
            Stage::Extraction => "extracting scene",
            Stage::Render => "rendering video",
        };
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, _attempt: u32) {
        self.bar
            .println(format!("  {} {}", green("✓"), dim(&stage.to_string())));
    }

    fn on_attempt_failed(&self, attempt: u32, error: &str) {
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} attempt {}  {}", red("✗"), attempt, red(&msg)));
    }

    fn on_run_complete(&self, _result: &PipelineResult) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Animate a concept
  manimator --prompt "Explain the quadratic formula"

  # Summarise a paper (local file or URL)
  manimator --pdf https://arxiv.org/pdf/1706.03762

  # Animate a photographed note, keep the generated code
  manimator --handwriting note.jpg --save-code

  # Re-render an edited program without calling a model
  manimator --render-only outputs/QuadraticFormula.py

  # Run Manim through a specific interpreter
  manimator --manim-bin python --manim-arg=-m --manim-arg=manim --prompt "Fourier series"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  GEMINI_API_KEY              Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER      Override provider (openai, anthropic, gemini, ollama)
  MANIMATOR_MODEL             Storyboard / vision model (default gpt-4o)
  MANIMATOR_CODE_MODEL        Code-generation model (default: same as above)
  MANIMATOR_FALLBACK_MODEL    Retried once when a PDF storyboard call fails
  MAX_IMAGE_SIZE_MB           Handwriting upload ceiling (default 10)
  MANIM_BIN                   Render engine executable (default manim)
  PDFIUM_LIB_PATH             Path to an existing libpdfium
"#;

/// Generate explanatory Manim animations from text, papers, or notes.
#[derive(Parser, Debug)]
#[command(
    name = "manimator",
    version,
    about = "Generate explanatory Manim animations from text, PDFs, or handwritten notes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
#[command(group(
    clap::ArgGroup::new("input")
        .required(true)
        .args(["prompt", "pdf", "handwriting", "render_only"])
))]
struct Cli {
    /// Concept to animate.
    #[arg(long)]
    prompt: Option<String>,

    /// PDF path or HTTP/HTTPS URL (e.g. a research paper).
    #[arg(long)]
    pdf: Option<String>,

    /// Handwritten note: JPEG, PNG, or PDF (first page), path or URL.
    #[arg(long)]
    handwriting: Option<String>,

    /// Render an existing Manim program, skipping the models.
    #[arg(long, value_name = "FILE")]
    render_only: Option<PathBuf>,

    /// Storyboard / vision model ID.
    #[arg(long, env = "MANIMATOR_MODEL", default_value = manimator::config::DEFAULT_MODEL)]
    model: String,

    /// Code-generation model ID (defaults to --model).
    #[arg(long, env = "MANIMATOR_CODE_MODEL")]
    code_model: Option<String>,

    /// Fallback model for PDF storyboards.
    #[arg(long, env = "MANIMATOR_FALLBACK_MODEL")]
    fallback_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Handwriting upload ceiling in MB.
    #[arg(long, env = "MAX_IMAGE_SIZE_MB", default_value_t = 10)]
    max_upload_mb: u64,

    /// Transport retries per model call.
    #[arg(long, env = "MANIMATOR_TRANSPORT_RETRIES", default_value_t = 2)]
    transport_retries: u32,

    /// Full chain attempts (storyboard → render).
    #[arg(long, env = "MANIMATOR_ATTEMPTS", default_value_t = 2)]
    attempts: u32,

    /// PDF rasterisation DPI (72–600).
    #[arg(long, env = "MANIMATOR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MANIMATOR_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Directory receiving rendered videos.
    #[arg(short, long, env = "MANIMATOR_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Render engine executable.
    #[arg(long, env = "MANIM_BIN", default_value = "manim")]
    manim_bin: PathBuf,

    /// Argument placed before Manim's own (repeatable).
    #[arg(long = "manim-arg", allow_hyphen_values = true)]
    manim_args: Vec<String>,

    /// Render timeout in seconds.
    #[arg(long, env = "MANIMATOR_RENDER_TIMEOUT", default_value_t = 600)]
    render_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "MANIMATOR_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MANIMATOR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Write the final source next to the video.
    #[arg(long)]
    save_code: bool,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "MANIMATOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MANIMATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MANIMATOR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner owns the terminal while active; keep library logs quiet.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let mut pipeline = Pipeline::new(config);
    if show_progress {
        pipeline = pipeline.with_observer(CliObserver::new());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let result = if let Some(ref path) = cli.render_only {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read program from {}", path.display()))?;
        pipeline.render_source(&source).await
    } else {
        let request = build_request(&cli, pipeline.config()).await?;
        pipeline.run(&request).await
    };

    let saved_code = if cli.save_code {
        save_code(&result, &cli.output_dir).await?
    } else {
        None
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !cli.quiet {
        report(&result, saved_code.as_deref());
    }

    if !result.is_success() {
        anyhow::bail!("{}", result.status);
    }
    Ok(())
}

fn report(result: &PipelineResult, saved_code: Option<&Path>) {
    match result.artifact_path {
        Some(ref path) => {
            eprintln!(
                "{} {}  {}",
                green("✔"),
                result.status,
                dim(&format!("({} attempt(s))", result.attempts))
            );
            println!("{}", bold(&path.display().to_string()));
        }
        None => eprintln!("{} {}", red("✘"), result.status),
    }
    if let Some(path) = saved_code {
        eprintln!("   {} {}", cyan("code"), path.display());
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(&cli.model)
        .max_upload_mb(cli.max_upload_mb)
        .transport_retries(cli.transport_retries)
        .max_attempts(cli.attempts)
        .dpi(cli.dpi)
        .temperature(cli.temperature)
        .output_dir(&cli.output_dir)
        .engine_program(&cli.manim_bin)
        .engine_prefix_args(cli.manim_args.iter())
        .render_timeout_secs(cli.render_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref m) = cli.code_model {
        builder = builder.code_model(m);
    }
    if let Some(ref m) = cli.fallback_model {
        builder = builder.fallback_model(m);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }

    builder.build().context("Invalid configuration")
}

/// Resolve the selected input into a request.
async fn build_request(cli: &Cli, config: &PipelineConfig) -> Result<GenerationRequest> {
    if let Some(ref prompt) = cli.prompt {
        return Ok(GenerationRequest::text(prompt.as_str()));
    }
    if let Some(ref pdf) = cli.pdf {
        let bytes = read_source(pdf, cli.download_timeout, None)
            .await
            .context("Failed to read PDF")?;
        return Ok(GenerationRequest::pdf(bytes));
    }
    if let Some(ref note) = cli.handwriting {
        let bytes = read_source(note, cli.download_timeout, Some(config.max_upload_bytes))
            .await
            .context("Failed to read handwriting file")?;
        return Ok(GenerationRequest::handwriting(bytes, mime_from_path(note)));
    }
    anyhow::bail!("one of --prompt, --pdf, --handwriting or --render-only is required")
}

/// Write the final source as `<video stem>.py`, or `<output_dir>/scene.py` without a video.
async fn save_code(result: &PipelineResult, output_dir: &Path) -> Result<Option<PathBuf>> {
    let Some(ref code) = result.source_code else {
        return Ok(None);
    };
    let path = match result.artifact_path {
        Some(ref video) => video.with_extension("py"),
        None => output_dir.join("scene.py"),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, code)
        .await
        .with_context(|| format!("Failed to write code to {}", path.display()))?;
    Ok(Some(path))
}
