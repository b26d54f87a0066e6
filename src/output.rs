//! The uniform result returned by every pipeline entry point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status string returned on full success.
pub const SUCCESS_STATUS: &str = "Animation generated successfully!";

/// Outcome of one pipeline run.
///
/// * `artifact_path`: present only on full success.
/// * `source_code`: present whenever code synthesis produced something,
///   even if rendering failed, so the caller can inspect or re-render it.
/// * `status`: human-readable outcome, always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub artifact_path: Option<PathBuf>,
    pub source_code: Option<String>,
    pub status: String,
    /// Chain attempts consumed (0 when the input was rejected up front).
    pub attempts: u32,
}

impl PipelineResult {
    pub(crate) fn success(artifact_path: PathBuf, source_code: String, attempts: u32) -> Self {
        Self {
            artifact_path: Some(artifact_path),
            source_code: Some(source_code),
            status: SUCCESS_STATUS.to_string(),
            attempts,
        }
    }

    pub(crate) fn failure(source_code: Option<String>, status: String, attempts: u32) -> Self {
        Self {
            artifact_path: None,
            source_code,
            status,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.artifact_path.is_some()
    }

    /// Split into the `(artifact_path, source_code, status)` triple.
    pub fn into_parts(self) -> (Option<PathBuf>, Option<String>, String) {
        (self.artifact_path, self.source_code, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_has_no_artifact() {
        let r = PipelineResult::failure(Some("code".into()), "Failed to render".into(), 2);
        assert!(!r.is_success());
        let (path, code, status) = r.into_parts();
        assert!(path.is_none());
        assert_eq!(code.as_deref(), Some("code"));
        assert_eq!(status, "Failed to render");
    }

    #[test]
    fn serialises_to_json() {
        let r = PipelineResult::success(PathBuf::from("outputs/A.mp4"), "x".into(), 1);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"artifact_path\":\"outputs/A.mp4\""));
        assert!(json.contains(SUCCESS_STATUS));
    }
}
