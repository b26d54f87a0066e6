//! # manimator
//!
//! Turn a concept, a research paper, or a handwritten note into a short
//! explanatory animation rendered with Manim.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (text | PDF | handwriting)
//!  │
//!  ├─ 1. Normalize  validate, sniff, rasterise PDF pages via pdfium
//!  ├─ 2. Scene      storyboard from a vision/text model (+ fallback model for PDFs)
//!  ├─ 3. Code       one complete Manim program from the storyboard
//!  ├─ 4. Extract    fenced block + the single `Scene` subclass
//!  └─ 5. Render     `manim -ql` in a scoped temp dir, video copied to output_dir
//! ```
//!
//! Steps 2–5 form one *chain attempt*. A failed attempt restarts from step 2,
//! up to `max_attempts` (default 2). Step 1 runs once and is never retried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manimator::{GenerationRequest, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::builder().model("gpt-4o").build()?;
//!     let pipeline = Pipeline::new(config);
//!
//!     let result = pipeline
//!         .run(&GenerationRequest::text("Explain the quadratic formula"))
//!         .await;
//!     println!("{}", result.status);
//!     if let Some(path) = result.artifact_path {
//!         println!("video: {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manimator` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! manimator = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ocr;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HandwritingMode, PipelineConfig, PipelineConfigBuilder};
pub use error::{ExtractionFailure, InputError, PipelineError, RenderFailure, TransportError};
pub use ocr::{TextRecognizer, NO_TEXT_SENTINEL};
pub use orchestrator::Pipeline;
pub use output::{PipelineResult, SUCCESS_STATUS};
pub use pipeline::extract::extract;
pub use pipeline::llm::{ModelClient, Role, Turn};
pub use pipeline::render::{ManimCli, RenderEngine};
pub use progress::{NoopObserver, PipelineObserver, Stage};
pub use request::{
    ExtractedCode, GeneratedProgram, GenerationRequest, NormalizedInput, PageImage, PageSource,
    SceneDescription,
};
