//! Configuration for a generation pipeline.
//!
//! Every knob the pipeline reads lives in [`PipelineConfig`], built once via
//! [`PipelineConfigBuilder`] and validated before any run starts. Components
//! receive it by reference at construction; nothing re-reads the environment
//! mid-run. The CLI maps flags and environment variables onto the builder.

use crate::error::PipelineError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default primary model used for storyboard and vision calls.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for a manimator pipeline.
///
/// # Example
/// ```rust
/// use manimator::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4.1")
///     .fallback_model("gpt-4o-mini")
///     .max_upload_mb(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.code_model(), "gpt-4.1");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Primary model id for storyboard synthesis (text and vision). Default: `gpt-4o`.
    pub model: String,

    /// Model id for code synthesis. Falls back to `model` when `None`.
    pub code_model: Option<String>,

    /// Model retried exactly once when a document-storyboard call fails on `model`.
    pub fallback_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic"). Auto-detected when `None`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and is used for every model id.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens generated per model call. Default: 4096.
    pub max_tokens: usize,

    /// Transport-level retries on a failed storyboard call. Default: 2.
    pub transport_retries: u32,

    /// Initial transport retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Total chain attempts (SceneSynth → Render) per run. Default: 2.
    pub max_attempts: u32,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Upload ceiling for handwriting images, in bytes. Default: 10 MiB.
    pub max_upload_bytes: u64,

    /// Rasterisation DPI for PDF pages. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Longest edge of a rasterised page, in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// Cap on PDF pages sent to the vision model. Default: `None` (every page).
    pub max_pages: Option<usize>,

    /// How handwriting images are recognised. Default: [`HandwritingMode::Vision`].
    pub handwriting_mode: HandwritingMode,

    /// Render engine executable. Default: `manim`.
    pub engine_program: PathBuf,

    /// Arguments placed before the engine's own (e.g. `-m manim` for `python`).
    pub engine_prefix_args: Vec<String>,

    /// Render engine wall-clock limit in seconds. Default: 600.
    pub render_timeout_secs: u64,

    /// Where rendered videos are copied before the scoped directory is removed.
    pub output_dir: PathBuf,

    /// Parent directory for scoped render directories. System temp dir when `None`.
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            code_model: None,
            fallback_model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            transport_retries: 2,
            retry_backoff_ms: 500,
            max_attempts: 2,
            api_timeout_secs: 120,
            max_upload_bytes: 10 * 1024 * 1024,
            dpi: 300,
            max_rendered_pixels: 3000,
            max_pages: None,
            handwriting_mode: HandwritingMode::default(),
            engine_program: PathBuf::from("manim"),
            engine_prefix_args: Vec::new(),
            render_timeout_secs: 600,
            output_dir: PathBuf::from("outputs"),
            work_dir: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("code_model", &self.code_model)
            .field("fallback_model", &self.fallback_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("transport_retries", &self.transport_retries)
            .field("max_attempts", &self.max_attempts)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("dpi", &self.dpi)
            .field("max_pages", &self.max_pages)
            .field("handwriting_mode", &self.handwriting_mode)
            .field("engine_program", &self.engine_program)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model id used for code synthesis.
    pub fn code_model(&self) -> &str {
        self.code_model.as_deref().unwrap_or(&self.model)
    }

    /// Upload ceiling rounded to whole megabytes, for messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn code_model(mut self, model: impl Into<String>) -> Self {
        self.config.code_model = Some(model.into());
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.config.fallback_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn transport_retries(mut self, n: u32) -> Self {
        self.config.transport_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_upload_mb(mut self, mb: u64) -> Self {
        self.config.max_upload_bytes = mb * 1024 * 1024;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = Some(n.max(1));
        self
    }

    pub fn handwriting_mode(mut self, mode: HandwritingMode) -> Self {
        self.config.handwriting_mode = mode;
        self
    }

    pub fn engine_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.engine_program = program.into();
        self
    }

    pub fn engine_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Primary model id must not be empty".into(),
            ));
        }
        if c.code_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(
                "Code model id must not be empty".into(),
            ));
        }
        if c.fallback_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(
                "Fallback model id must not be empty".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.engine_program.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Render engine program must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How a handwriting image becomes storyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandwritingMode {
    /// Send the image straight to the vision model. (default)
    #[default]
    Vision,
    /// Recognise text with the attached [`crate::ocr::TextRecognizer`] first,
    /// then run the text-prompt flow.
    Ocr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.model, "gpt-4o");
        assert_eq!(c.code_model(), "gpt-4o");
        assert_eq!(c.transport_retries, 2);
        assert_eq!(c.max_attempts, 2);
        assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(c.max_upload_mb(), 10);
        assert_eq!(c.dpi, 300);
        assert_eq!(c.handwriting_mode, HandwritingMode::Vision);
        assert_eq!(c.max_pages, None);
    }

    #[test]
    fn page_cap_is_opt_in() {
        let c = PipelineConfig::builder().max_pages(0).build().unwrap();
        assert_eq!(c.max_pages, Some(1));
    }

    #[test]
    fn builder_clamps_and_overrides() {
        let c = PipelineConfig::builder()
            .dpi(2000)
            .code_model("gpt-4.1")
            .temperature(5.0)
            .max_upload_mb(3)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.code_model(), "gpt-4.1");
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_upload_bytes, 3 * 1024 * 1024);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = PipelineConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("max_attempts"), "got: {err}");
    }

    #[test]
    fn builder_rejects_blank_model() {
        assert!(PipelineConfig::builder().model("  ").build().is_err());
        assert!(PipelineConfig::builder().fallback_model("").build().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let dbg = format!("{:?}", PipelineConfig::default());
        assert!(dbg.contains("PipelineConfig"));
        assert!(dbg.contains("gpt-4o"));
    }
}
