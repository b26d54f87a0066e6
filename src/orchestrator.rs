//! The [`Pipeline`]: normalise once, then run bounded chain attempts.
//!
//! ```text
//! prepare ─▶ [ scene ─▶ code ─▶ extract ─▶ render ] × max_attempts
//! ```
//!
//! Every outcome is folded into a [`PipelineResult`]; `run` never returns an
//! error and never propagates a panic from a stage.

use crate::config::{HandwritingMode, PipelineConfig};
use crate::error::{ExtractionFailure, InputError, PipelineError};
use crate::ocr::{is_usable_text, TextRecognizer};
use crate::output::PipelineResult;
use crate::pipeline::llm::{EdgequakeClient, ModelClient, RetryPolicy};
use crate::pipeline::render::{ManimCli, RenderEngine, RenderExecutor};
use crate::pipeline::{code, extract, normalize, scene};
use crate::progress::{NoopObserver, Observer, Stage};
use crate::prompts::recognized_text_prompt;
use crate::request::{GeneratedProgram, GenerationRequest, NormalizedInput, PageSource};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sequences the stages for one configuration.
pub struct Pipeline {
    config: PipelineConfig,
    client: Arc<dyn ModelClient>,
    executor: RenderExecutor,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    observer: Observer,
}

impl Pipeline {
    /// Production wiring: `edgequake-llm` for models, the Manim CLI for rendering.
    pub fn new(config: PipelineConfig) -> Self {
        let client: Arc<dyn ModelClient> = Arc::new(EdgequakeClient::new(&config));
        let engine = Box::new(ManimCli::from_config(&config));
        Self::with_parts(config, client, engine)
    }

    /// Explicit collaborators, e.g. scripted clients in tests.
    pub fn with_parts(
        config: PipelineConfig,
        client: Arc<dyn ModelClient>,
        engine: Box<dyn RenderEngine>,
    ) -> Self {
        let executor = RenderExecutor::new(engine, &config);
        Self {
            config,
            client,
            executor,
            recognizer: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach the OCR collaborator used when `handwriting_mode` is `Ocr`.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Turn a request into an animation.
    pub async fn run(&self, request: &GenerationRequest) -> PipelineResult {
        let start = Instant::now();
        info!("Starting {} generation", request.kind());

        let result = match self.prepare(request).await {
            Ok(input) => self.run_chain(&input).await,
            Err(e) => {
                warn!("Request rejected: {}", e);
                self.observer.on_attempt_failed(0, &e.to_string());
                PipelineResult::failure(None, fatal_status(&e), 0)
            }
        };

        info!(
            "Finished in {:?} after {} attempt(s): {}",
            start.elapsed(),
            result.attempts,
            result.status
        );
        self.observer.on_run_complete(&result);
        result
    }

    /// Run the attempt chain on input that is already normalised, e.g. pages
    /// the caller rasterised itself. The input phase is skipped.
    pub async fn run_normalized(&self, input: &NormalizedInput) -> PipelineResult {
        let result = self.run_chain(input).await;
        self.observer.on_run_complete(&result);
        result
    }

    /// Synchronous wrapper around [`Pipeline::run`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn run_sync(&self, request: &GenerationRequest) -> PipelineResult {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.run(request)),
            Err(e) => PipelineResult::failure(
                None,
                format!("Error: failed to create tokio runtime: {}", e),
                0,
            ),
        }
    }

    /// Re-render a caller-supplied program: extract then render, one attempt.
    pub async fn render_source(&self, source: &str) -> PipelineResult {
        self.observer.on_attempt_start(1, 1);
        let program = GeneratedProgram(source.to_string());
        let mut last_source = Some(source.to_string());

        let outcome = AssertUnwindSafe(self.extract_and_render(&program, 1, &mut last_source))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Internal(panic_message(panic))));

        let result = match outcome {
            Ok((path, code)) => PipelineResult::success(path, code, 1),
            Err(e) => {
                warn!("Render-only run failed: {}", e);
                self.observer.on_attempt_failed(1, &e.to_string());
                let status = if e.is_retryable() {
                    exhausted_status(&e, 1)
                } else {
                    fatal_status(&e)
                };
                PipelineResult::failure(last_source, status, 1)
            }
        };
        self.observer.on_run_complete(&result);
        result
    }

    /// Input phase: runs once per request and is never retried.
    async fn prepare(&self, request: &GenerationRequest) -> Result<NormalizedInput, PipelineError> {
        self.observer.on_stage_start(Stage::Normalize, 0);
        let input = normalize::normalize(request, &self.config).await?;
        let input = match self.config.handwriting_mode {
            HandwritingMode::Ocr => self.recognize(input).await?,
            HandwritingMode::Vision => input,
        };
        self.observer.on_stage_complete(Stage::Normalize, 0);
        Ok(input)
    }

    async fn recognize(&self, input: NormalizedInput) -> Result<NormalizedInput, PipelineError> {
        let image = match input {
            NormalizedInput::Pages {
                source: PageSource::Handwriting,
                mut images,
                ..
            } if !images.is_empty() => images.swap_remove(0),
            other => return Ok(other),
        };

        let recognizer = self
            .recognizer
            .as_ref()
            .ok_or(InputError::RecognizerMissing)?;
        let text = recognizer.recognize(&image.bytes, &image.mime).await?;
        if !is_usable_text(&text) {
            return Err(InputError::NoRecognizedText.into());
        }
        debug!("Recognised {} chars of handwriting", text.len());
        Ok(NormalizedInput::Text(recognized_text_prompt(text.trim())))
    }

    async fn run_chain(&self, input: &NormalizedInput) -> PipelineResult {
        let max = self.config.max_attempts;
        let mut last_source: Option<String> = None;
        let mut last_error: Option<PipelineError> = None;

        for attempt in 1..=max {
            self.observer.on_attempt_start(attempt, max);
            info!("Attempt {}/{}", attempt, max);

            let outcome = AssertUnwindSafe(self.attempt(input, attempt, &mut last_source))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(PipelineError::Internal(panic_message(panic))));

            let err = match outcome {
                Ok((path, code)) => return PipelineResult::success(path, code, attempt),
                Err(e) => e,
            };

            warn!("Attempt {}/{} failed: {}", attempt, max, err);
            self.observer.on_attempt_failed(attempt, &err.to_string());
            if !err.is_retryable() {
                return PipelineResult::failure(last_source, fatal_status(&err), attempt);
            }
            last_error = Some(err);
        }

        let status = match last_error {
            Some(ref e) => exhausted_status(e, max),
            None => format!("Error after {}", attempts_label(max)),
        };
        PipelineResult::failure(last_source, status, max)
    }

    /// One chain attempt. `last_source` is updated as soon as code exists.
    async fn attempt(
        &self,
        input: &NormalizedInput,
        attempt: u32,
        last_source: &mut Option<String>,
    ) -> Result<(PathBuf, String), PipelineError> {
        let client = self.client.as_ref();

        self.observer.on_stage_start(Stage::SceneSynthesis, attempt);
        let storyboard = scene::describe(
            client,
            input,
            &self.config.model,
            self.config.fallback_model.as_deref(),
            RetryPolicy::from_config(&self.config),
        )
        .await?;
        self.observer.on_stage_complete(Stage::SceneSynthesis, attempt);

        self.observer.on_stage_start(Stage::CodeSynthesis, attempt);
        let program = code::synthesize_code(client, &storyboard, self.config.code_model()).await?;
        self.observer.on_stage_complete(Stage::CodeSynthesis, attempt);

        self.extract_and_render(&program, attempt, last_source).await
    }

    async fn extract_and_render(
        &self,
        program: &GeneratedProgram,
        attempt: u32,
        last_source: &mut Option<String>,
    ) -> Result<(PathBuf, String), PipelineError> {
        self.observer.on_stage_start(Stage::Extraction, attempt);
        let extracted = match extract::try_extract(program) {
            Ok(extracted) => extracted,
            Err(failure) => {
                *last_source = Some(program.as_str().to_string());
                return Err(failure.into());
            }
        };
        *last_source = Some(extracted.code.clone());
        self.observer.on_stage_complete(Stage::Extraction, attempt);
        debug!("Scene class: {}", extracted.scene_id);

        self.observer.on_stage_start(Stage::Render, attempt);
        let path = self
            .executor
            .try_render(&extracted.code, &extracted.scene_id)
            .await?;
        self.observer.on_stage_complete(Stage::Render, attempt);

        Ok((path, extracted.code))
    }
}

fn attempts_label(n: u32) -> String {
    if n == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", n)
    }
}

/// Status for a retryable failure that used up the attempt budget.
fn exhausted_status(err: &PipelineError, attempts: u32) -> String {
    let after = attempts_label(attempts);
    match err {
        PipelineError::Extraction(ExtractionFailure::NoCode) => {
            format!("No valid Manim code generated after {}", after)
        }
        PipelineError::Extraction(ExtractionFailure::NoSceneClass) => {
            format!("No Scene class found after {}", after)
        }
        PipelineError::Extraction(e) => format!("No Scene class found after {}: {}", after, e),
        PipelineError::Render(e) => format!("Failed to render animation after {}: {}", after, e),
        other => format!("Error after {}: {}", after, other),
    }
}

/// Status for a failure that aborts without retry.
fn fatal_status(err: &PipelineError) -> String {
    match err {
        PipelineError::Input(e) => format!("Invalid input: {}", e),
        other => other.to_string(),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("stage panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFailure;

    #[test]
    fn exhausted_status_names_the_failure() {
        let e = PipelineError::from(ExtractionFailure::NoCode);
        assert_eq!(
            exhausted_status(&e, 2),
            "No valid Manim code generated after 2 attempts"
        );
        let e = PipelineError::from(ExtractionFailure::NoSceneClass);
        assert_eq!(exhausted_status(&e, 1), "No Scene class found after 1 attempt");
        let e = PipelineError::from(RenderFailure::Timeout { secs: 5 });
        assert!(exhausted_status(&e, 2).starts_with("Failed to render animation after 2 attempts"));
    }

    #[test]
    fn input_errors_are_prefixed() {
        let e = PipelineError::from(InputError::Empty { what: "PDF file" });
        assert_eq!(fatal_status(&e), "Invalid input: Empty PDF file provided");
    }

    #[test]
    fn panic_payloads_are_described() {
        let msg = panic_message(Box::new("boom"));
        assert_eq!(msg, "stage panicked: boom");
        let msg = panic_message(Box::new(String::from("owned")));
        assert_eq!(msg, "stage panicked: owned");
        let msg = panic_message(Box::new(42u8));
        assert_eq!(msg, "stage panicked: unknown panic");
    }
}
