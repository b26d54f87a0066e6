//! Input normalisation: turn a [`GenerationRequest`] into model-ready input.
//!
//! Text passes through untouched. PDFs are rasterised page by page so the
//! vision model reads figures and formulae as a human would. Handwriting is
//! size-checked and its container type sniffed from the leading bytes.
//!
//! Normalisation is deterministic for a given request, so the orchestrator
//! runs it once per run and reuses the result across chain attempts.

use crate::config::PipelineConfig;
use crate::error::{InputError, PipelineError};
use crate::pipeline::rasterize;
use crate::prompts::HANDWRITING_INSTRUCTION;
use crate::request::{GenerationRequest, NormalizedInput, PageImage, PageSource};
use tracing::{debug, info};

/// Container type detected from an upload's magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Pdf,
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Pdf => "application/pdf",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// Detect the upload container. Unrecognised signatures are treated as JPEG.
pub fn sniff_image_kind(bytes: &[u8]) -> ImageKind {
    if bytes.starts_with(b"%PDF") {
        ImageKind::Pdf
    } else if bytes.starts_with(b"\x89PNG") {
        ImageKind::Png
    } else {
        // JPEG (FF D8 FF) and anything unrecognised.
        ImageKind::Jpeg
    }
}

/// Reject uploads larger than the configured ceiling.
pub fn validate_upload_size(bytes: &[u8], config: &PipelineConfig) -> Result<(), InputError> {
    if bytes.len() as u64 > config.max_upload_bytes {
        return Err(InputError::PayloadTooLarge {
            size: bytes.len(),
            limit_mb: config.max_upload_mb(),
        });
    }
    Ok(())
}

/// Normalise a request. Performs no network I/O.
pub async fn normalize(
    request: &GenerationRequest,
    config: &PipelineConfig,
) -> Result<NormalizedInput, PipelineError> {
    match request {
        GenerationRequest::TextPrompt(prompt) => {
            if prompt.trim().is_empty() {
                return Err(InputError::Empty { what: "prompt" }.into());
            }
            Ok(NormalizedInput::Text(prompt.clone()))
        }

        GenerationRequest::PdfDocument(bytes) => {
            if bytes.is_empty() {
                return Err(InputError::Empty { what: "PDF file" }.into());
            }
            let pages = rasterize::rasterize_pdf(
                bytes.clone(),
                config.dpi,
                config.max_rendered_pixels,
                config.max_pages,
            )
            .await?;
            info!("Converted PDF to {} page images", pages.len());

            Ok(NormalizedInput::Pages {
                source: PageSource::Document,
                images: pages
                    .into_iter()
                    .map(|png| PageImage::new(png, "image/png"))
                    .collect(),
                instruction: None,
            })
        }

        GenerationRequest::HandwritingImage { bytes, mime } => {
            if bytes.is_empty() {
                return Err(InputError::Empty { what: "file" }.into());
            }
            validate_upload_size(bytes, config)?;

            let kind = sniff_image_kind(bytes);
            debug!("Handwriting upload: {} bytes, hint {}, sniffed {:?}", bytes.len(), mime, kind);

            let image = match kind {
                ImageKind::Pdf => {
                    let mut pages = rasterize::rasterize_pdf(
                        bytes.clone(),
                        config.dpi,
                        config.max_rendered_pixels,
                        Some(1),
                    )
                    .await?;
                    PageImage::new(pages.remove(0), "image/png")
                }
                other => PageImage::new(bytes.clone(), other.mime()),
            };

            Ok(NormalizedInput::Pages {
                source: PageSource::Handwriting,
                images: vec![image],
                instruction: Some(HANDWRITING_INSTRUCTION.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff_image_kind(b"%PDF-1.7 ..."), ImageKind::Pdf);
        assert_eq!(sniff_image_kind(b"\xff\xd8\xff\xe0...."), ImageKind::Jpeg);
        assert_eq!(sniff_image_kind(b"\x89PNG\r\n\x1a\n"), ImageKind::Png);
    }

    #[test]
    fn unknown_signature_defaults_to_jpeg() {
        assert_eq!(sniff_image_kind(b"GIF89a"), ImageKind::Jpeg);
        assert_eq!(sniff_image_kind(b""), ImageKind::Jpeg);
    }

    #[tokio::test]
    async fn text_passes_through() {
        let config = PipelineConfig::default();
        let out = normalize(&GenerationRequest::text("Explain quadratic formula"), &config)
            .await
            .unwrap();
        assert_eq!(out, NormalizedInput::Text("Explain quadratic formula".into()));
    }

    #[tokio::test]
    async fn empty_pdf_is_rejected() {
        let config = PipelineConfig::default();
        let err = normalize(&GenerationRequest::pdf(Vec::new()), &config)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Empty PDF file provided");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn oversized_handwriting_is_rejected() {
        let config = PipelineConfig::builder().max_upload_bytes(8).build().unwrap();
        let err = normalize(
            &GenerationRequest::handwriting(vec![0u8; 9], "image/jpeg"),
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Input(InputError::PayloadTooLarge { size: 9, .. })
        ));
    }

    #[tokio::test]
    async fn handwriting_limit_is_inclusive() {
        let config = PipelineConfig::builder().max_upload_bytes(8).build().unwrap();
        let bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        let out = normalize(&GenerationRequest::handwriting(bytes.clone(), "image/png"), &config)
            .await
            .unwrap();
        match out {
            NormalizedInput::Pages {
                source,
                images,
                instruction,
            } => {
                assert_eq!(source, PageSource::Handwriting);
                assert_eq!(images, vec![PageImage::new(bytes, "image/png")]);
                assert_eq!(instruction.as_deref(), Some(HANDWRITING_INSTRUCTION));
            }
            other => panic!("expected pages, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handwriting_uses_sniffed_type_over_hint() {
        let config = PipelineConfig::default();
        let bytes = b"\xff\xd8\xff\xe0jpeg".to_vec();
        let out = normalize(&GenerationRequest::handwriting(bytes, "image/png"), &config)
            .await
            .unwrap();
        let NormalizedInput::Pages { images, .. } = out else {
            panic!("expected pages");
        };
        assert_eq!(images[0].mime, "image/jpeg");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let config = PipelineConfig::default();
        let err = normalize(&GenerationRequest::text("   "), &config)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Empty prompt provided");
    }
}
