//! Values that flow between pipeline stages.
//!
//! ```text
//! GenerationRequest ─▶ NormalizedInput ─▶ SceneDescription ─▶ GeneratedProgram ─▶ ExtractedCode
//!   (caller)            (normalize)         (scene)             (code)              (extract)
//! ```
//!
//! Each value is produced by exactly one stage and consumed by the next;
//! none of them carries identity beyond the run that created it.

use serde::{Deserialize, Serialize};

/// What the caller wants animated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    /// Free-text concept description.
    TextPrompt(String),
    /// Raw PDF bytes, typically a research paper.
    PdfDocument(Vec<u8>),
    /// A photographed or scanned handwritten note with the caller's MIME hint.
    HandwritingImage { bytes: Vec<u8>, mime: String },
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        GenerationRequest::TextPrompt(prompt.into())
    }

    pub fn pdf(bytes: impl Into<Vec<u8>>) -> Self {
        GenerationRequest::PdfDocument(bytes.into())
    }

    pub fn handwriting(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        GenerationRequest::HandwritingImage {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationRequest::TextPrompt(_) => "text",
            GenerationRequest::PdfDocument(_) => "pdf",
            GenerationRequest::HandwritingImage { .. } => "handwriting",
        }
    }
}

/// One image handed to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl PageImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

/// Which flow produced a page sequence; selects prompts and models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// Rasterised PDF pages. Uses the document few-shot and the fallback model.
    Document,
    /// A handwritten note (image, or first page of a PDF note).
    Handwriting,
}

/// Model-ready form of a [`GenerationRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// Plain text prompt.
    Text(String),
    /// One or more ordered page images plus an optional instruction.
    Pages {
        source: PageSource,
        images: Vec<PageImage>,
        instruction: Option<String>,
    },
}

/// Storyboard text: Topic, Key Points, Visual Elements, Style.
///
/// Stored verbatim as returned by the model; its schema is checked only
/// indirectly, by extraction succeeding downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescription(pub String);

impl SceneDescription {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a section heading (e.g. `"Topic"`) appears in the storyboard.
    pub fn has_section(&self, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.0.lines().any(|line| {
            line.trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace())
                .to_lowercase()
                .starts_with(&needle)
        })
    }
}

/// Raw code-generation response: prose plus (usually) one fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram(pub String);

impl GeneratedProgram {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Isolated program source and the single scene class it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCode {
    pub code: String,
    pub scene_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_section_ignores_markup() {
        let s = SceneDescription(
            "**Topic**: Quadratic formula\n## Key Points\n- roots".to_string(),
        );
        assert!(s.has_section("Topic"));
        assert!(s.has_section("key points"));
        assert!(!s.has_section("Style"));
    }

    #[test]
    fn request_kinds() {
        assert_eq!(GenerationRequest::text("x").kind(), "text");
        assert_eq!(GenerationRequest::pdf(vec![1]).kind(), "pdf");
        assert_eq!(
            GenerationRequest::handwriting(vec![1], "image/png").kind(),
            "handwriting"
        );
    }
}
