//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via [`crate::Pipeline::with_observer`]
//! to follow a run as it moves through its stages. The CLI uses this to drive
//! a spinner; tests use it to count stage invocations.
//!
//! # Example
//!
//! ```rust
//! use manimator::{PipelineObserver, Stage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct RenderCounter(AtomicUsize);
//!
//! impl PipelineObserver for RenderCounter {
//!     fn on_stage_start(&self, stage: Stage, _attempt: u32) {
//!         if stage == Stage::Render {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::PipelineResult;
use std::fmt;
use std::sync::Arc;

/// One step of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalize,
    SceneSynthesis,
    CodeSynthesis,
    Extraction,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::SceneSynthesis => "storyboard",
            Stage::CodeSynthesis => "code",
            Stage::Extraction => "extract",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as a run progresses.
///
/// All methods default to no-ops. `attempt` is 1-based; the normalise stage,
/// which runs once before the first attempt, reports attempt `0`.
pub trait PipelineObserver: Send + Sync {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    fn on_stage_start(&self, stage: Stage, attempt: u32) {
        let _ = (stage, attempt);
    }

    fn on_stage_complete(&self, stage: Stage, attempt: u32) {
        let _ = (stage, attempt);
    }

    /// Called when an attempt ends in a failure, retryable or not.
    fn on_attempt_failed(&self, attempt: u32, error: &str) {
        let _ = (attempt, error);
    }

    fn on_run_complete(&self, result: &PipelineResult) {
        let _ = result;
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Shared observer handle.
pub type Observer = Arc<dyn PipelineObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl PipelineObserver for Recorder {
        fn on_stage_start(&self, stage: Stage, attempt: u32) {
            self.0.lock().unwrap().push(format!("{stage}@{attempt}"));
        }
    }

    #[test]
    fn defaults_are_noops() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_attempt_start(1, 2);
        obs.on_stage_start(Stage::Render, 1);
        obs.on_attempt_failed(1, "boom");
    }

    #[test]
    fn overridden_method_records() {
        let rec = Recorder(Mutex::new(vec![]));
        rec.on_stage_start(Stage::Normalize, 0);
        rec.on_stage_start(Stage::CodeSynthesis, 2);
        assert_eq!(*rec.0.lock().unwrap(), vec!["normalize@0", "code@2"]);
    }
}
