//! Image encoding for vision-model requests.
//!
//! Rasterised pages are stored as PNG (lossless; formula strokes stay crisp),
//! and every image crosses the wire as a base64 `ImageData` with
//! `detail: "high"` so fine handwriting is not downsampled to one tile.

use crate::request::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap a page image as base64 `ImageData` ready for the provider.
pub fn to_image_data(page: &PageImage) -> ImageData {
    let b64 = STANDARD.encode(&page.bytes);
    debug!("Encoded {} image → {} bytes base64", page.mime, b64.len());
    ImageData::new(b64, page.mime.clone()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn image_data_round_trips_bytes() {
        let page = PageImage::new(vec![0xff, 0xd8, 0xff, 0x00], "image/jpeg");
        let data = to_image_data(&page);
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), page.bytes);
    }
}
