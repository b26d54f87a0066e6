//! Error types for the manimator pipeline.
//!
//! Errors are split by the stage that raises them, and each kind carries a
//! fixed retry policy that the orchestrator reads through
//! [`PipelineError::is_retryable`]:
//!
//! | Kind | Raised by | Chain retry? |
//! |------|-----------|--------------|
//! | [`InputError`] | normaliser, OCR step, source resolution | no |
//! | [`TransportError`] | model calls, after their own retries | yes |
//! | [`ExtractionFailure`] | code extractor | yes |
//! | [`RenderFailure`] | render engine | yes |
//! | `Resource` | scoped temp directory / output copy | no |
//!
//! Callers of [`crate::Pipeline::run`] never see these directly: every
//! failure is folded into the status string of a
//! [`crate::output::PipelineResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Chain-level error produced by one pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request itself is unusable. Never retried.
    #[error(transparent)]
    Input(#[from] InputError),

    /// A model call failed after its transport-level retries.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The generated program held no usable scene.
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),

    /// The render engine produced no artifact.
    #[error(transparent)]
    Render(#[from] RenderFailure),

    /// A scoped working directory or output file could not be managed.
    #[error("Resource error at '{path}': {detail}")]
    Resource { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal failure, including a panic caught at the attempt boundary.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the orchestrator may restart the chain after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transport(_)
                | PipelineError::Extraction(_)
                | PipelineError::Render(_)
                | PipelineError::Internal(_)
        )
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Resource {
            path: path.into(),
            detail: err.to_string(),
        }
    }
}

/// The request was empty, oversized, or could not be turned into model input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// No bytes (or no text) were supplied.
    #[error("Empty {what} provided")]
    Empty { what: &'static str },

    /// Upload exceeds the configured ceiling.
    #[error("File size exceeds {limit_mb}MB limit ({size} bytes)")]
    PayloadTooLarge { size: usize, limit_mb: u64 },

    /// PDF could not be rasterised, or produced zero pages.
    #[error("Could not convert PDF to images: {detail}")]
    Conversion { detail: String },

    /// The OCR collaborator returned nothing usable.
    #[error("No text could be extracted from the handwritten content")]
    NoRecognizedText,

    /// OCR mode was requested without a recogniser attached.
    #[error("Handwriting OCR mode requires a text recogniser")]
    RecognizerMissing,

    /// Local input path does not exist.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Local input path is not readable.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP download of the input failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// HTTP download exceeded its timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },
}

/// A model call failed after the transport exhausted its own retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// 401/403, missing or rejected API key, provider not configured.
    #[error("Authentication failed for model '{model}': {detail}")]
    Authentication { model: String, detail: String },

    /// HTTP 429 or provider quota exhaustion.
    #[error("Rate limit exceeded for model '{model}': {detail}")]
    RateLimited { model: String, detail: String },

    /// The call did not finish within `api_timeout_secs`.
    #[error("Model '{model}' timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    /// The provider or its HTTP client reported a timeout of its own.
    #[error("Model '{model}' timed out: {detail}")]
    ProviderTimeout { model: String, detail: String },

    /// The provider answered, but with nothing usable.
    #[error("Malformed response from model '{model}': {detail}")]
    MalformedResponse { model: String, detail: String },

    /// Any other provider or network failure.
    #[error("Model '{model}' unavailable: {detail}")]
    Unavailable { model: String, detail: String },
}

impl TransportError {
    /// Map a provider error message onto a transport error kind.
    pub fn classify(model: &str, message: &str) -> Self {
        let lower = message.to_lowercase();
        let model = model.to_string();
        let detail = message.to_string();

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("authentication")
            || lower.contains("api key")
            || lower.contains("api_key")
        {
            TransportError::Authentication { model, detail }
        } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
            TransportError::RateLimited { model, detail }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            TransportError::ProviderTimeout { model, detail }
        } else {
            TransportError::Unavailable { model, detail }
        }
    }
}

/// Why the code extractor rejected a generated program.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Nothing that looks like code was found.
    #[error("No valid Manim code generated")]
    NoCode,

    /// Code was found, but no class inheriting a scene base.
    #[error("No Scene class found")]
    NoSceneClass,

    /// More than one scene class; the render target is ambiguous.
    #[error("Ambiguous scene: found {count} Scene classes ({names})")]
    AmbiguousScene { count: usize, names: String },
}

/// The render engine ran (or tried to) but produced no video.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderFailure {
    /// Scene identifier is not a valid class name.
    #[error("Invalid scene identifier '{scene}'")]
    InvalidSceneId { scene: String },

    /// Engine binary could not be started.
    #[error("Failed to launch render engine '{program}': {detail}")]
    Launch { program: String, detail: String },

    /// Engine exited non-zero.
    #[error("Render engine exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    /// Engine exceeded `render_timeout_secs` and was killed.
    #[error("Render engine timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Engine reported success but no video was found.
    #[error("No video produced for scene '{scene}'")]
    MissingArtifact { scene: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pdf_display() {
        let e = InputError::Empty { what: "PDF file" };
        assert_eq!(e.to_string(), "Empty PDF file provided");
    }

    #[test]
    fn payload_too_large_display() {
        let e = InputError::PayloadTooLarge {
            size: 11 * 1024 * 1024,
            limit_mb: 10,
        };
        assert!(e.to_string().contains("10MB"), "got: {e}");
    }

    #[test]
    fn retry_policy_by_kind() {
        assert!(!PipelineError::from(InputError::NoRecognizedText).is_retryable());
        assert!(!PipelineError::resource("/tmp/x", "denied").is_retryable());
        assert!(!PipelineError::InvalidConfig("x".into()).is_retryable());
        assert!(PipelineError::from(ExtractionFailure::NoCode).is_retryable());
        assert!(PipelineError::from(RenderFailure::Timeout { secs: 1 }).is_retryable());
        assert!(PipelineError::Internal("panic".into()).is_retryable());
        assert!(PipelineError::from(TransportError::Timeout {
            model: "m".into(),
            secs: 1
        })
        .is_retryable());
    }

    #[test]
    fn classify_transport_errors() {
        assert!(matches!(
            TransportError::classify("gpt-4o", "HTTP 401 Unauthorized"),
            TransportError::Authentication { .. }
        ));
        assert!(matches!(
            TransportError::classify("gpt-4o", "Rate limit reached (429)"),
            TransportError::RateLimited { .. }
        ));
        let timeout = TransportError::classify("gpt-4o", "request timed out after 30s");
        assert!(matches!(timeout, TransportError::ProviderTimeout { .. }));
        assert_eq!(
            timeout.to_string(),
            "Model 'gpt-4o' timed out: request timed out after 30s"
        );
        assert!(matches!(
            TransportError::classify("gpt-4o", "connection reset by peer"),
            TransportError::Unavailable { .. }
        ));
    }

    #[test]
    fn render_failure_display() {
        let e = RenderFailure::ExitStatus {
            status: "exit status: 1".into(),
            stderr: "NameError".into(),
        };
        assert!(e.to_string().contains("NameError"));
    }
}
