//! PDF rasterisation: render pages to PNG bytes via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. [`rasterize_pdf`] moves the work onto the blocking
//! pool so the async runtime never stalls while a 20-page paper renders.
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` points at an explicit library file. Otherwise a library
//! next to the working directory is tried, then the system library.

use crate::error::{InputError, PipelineError};
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Rasterise the pages of an in-memory PDF into PNG bytes.
///
/// Pages are rendered at `dpi`, with the longest edge capped at
/// `max_pixels`. `max_pages` caps the count; `None` renders every page.
/// Returned in page order.
pub async fn rasterize_pdf(
    bytes: Vec<u8>,
    dpi: u32,
    max_pixels: u32,
    max_pages: Option<usize>,
) -> Result<Vec<Vec<u8>>, PipelineError> {
    let result = tokio::task::spawn_blocking(move || {
        rasterize_blocking(&bytes, dpi, max_pixels, max_pages)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Rasterise task panicked: {}", e)))?;

    Ok(result?)
}

/// Number of pages to render out of `total` under an optional cap.
pub fn pages_to_render(total: usize, max_pages: Option<usize>) -> usize {
    max_pages.map_or(total, |cap| total.min(cap))
}

fn bind_pdfium() -> Result<Pdfium, InputError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| InputError::Conversion {
        detail: format!("pdfium library unavailable: {:?}", e),
    })?;

    Ok(Pdfium::new(bindings))
}

fn rasterize_blocking(
    bytes: &[u8],
    dpi: u32,
    max_pixels: u32,
    max_pages: Option<usize>,
) -> Result<Vec<Vec<u8>>, InputError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| InputError::Conversion {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let count = pages_to_render(total_pages, max_pages);
    if count < total_pages {
        warn!("PDF has {} pages, sending first {}", total_pages, count);
    }
    let mut results = Vec::with_capacity(count);

    for (idx, page) in pages.iter().enumerate().take(count) {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| InputError::Conversion {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let png = encode::encode_png(&image).map_err(|e| InputError::Conversion {
            detail: format!("page {}: PNG encoding failed: {}", idx + 1, e),
        })?;
        results.push(png);
    }

    if results.is_empty() {
        return Err(InputError::Conversion {
            detail: "document has no pages".to_string(),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_page_without_cap() {
        assert_eq!(pages_to_render(12, None), 12);
        assert_eq!(pages_to_render(1, None), 1);
    }

    #[test]
    fn cap_limits_long_documents_only() {
        assert_eq!(pages_to_render(12, Some(10)), 10);
        assert_eq!(pages_to_render(3, Some(10)), 3);
        assert_eq!(pages_to_render(0, Some(1)), 0);
    }
}
