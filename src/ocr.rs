//! OCR collaborator contract.
//!
//! Mathpix / Google Vision integrations live outside this crate. The pipeline
//! only needs "image bytes in, text out", plus the knowledge that providers
//! report failure with a sentinel string rather than an error.

use crate::error::InputError;
use async_trait::async_trait;

/// Sentinel returned by recognisers when nothing could be read.
pub const NO_TEXT_SENTINEL: &str = "No text could be extracted from the provided file";

/// Extracts text (including LaTeX formulas) from a handwritten image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Returns the recognised text, or [`NO_TEXT_SENTINEL`] when nothing was found.
    async fn recognize(&self, image: &[u8], mime: &str) -> Result<String, InputError>;
}

/// Whether a recogniser's output carries usable text.
pub fn is_usable_text(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed != NO_TEXT_SENTINEL
}
