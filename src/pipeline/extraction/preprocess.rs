//! Image preprocessing for OCR input.
//!
//! Grayscale (BT.601 luma) followed by a global Otsu threshold from
//! `imageproc`. The output keeps the input dimensions and contains only 0 and
//! 255.

use std::io::Cursor;

use image::io::Reader;
use image::{DynamicImage, GrayImage, ImageFormat, ImageOutputFormat, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold};
use tracing::debug;

use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Formats the preprocessing decoder accepts. Anything else (GIF) is left to
/// the generic loader.
const PREPROCESS_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Tiff,
    ImageFormat::Bmp,
];

fn check_size(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::ImageDecode("empty image data".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageDecode(format!(
            "image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Decode raw bytes (PNG, JPEG, TIFF, BMP) for preprocessing.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ExtractionError> {
    check_size(bytes)?;
    let format =
        image::guess_format(bytes).map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;
    if !PREPROCESS_FORMATS.contains(&format) {
        return Err(ExtractionError::ImageDecode(format!(
            "{format:?} is not handled by the preprocessing decoder"
        )));
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))
}

/// Generic loader: any format the `image` crate can sniff and decode,
/// re-encoded as PNG for the OCR engine. No preprocessing.
pub fn load_original(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    check_size(bytes)?;
    let image = Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?
        .decode()
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::Preprocessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Convert RGB to grayscale using ITU-R BT.601 luma weights.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
            .round()
            .min(255.0) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }
    gray
}

/// Grayscale + Otsu binarization. Same dimensions as the input.
pub fn binarize(image: &DynamicImage) -> Result<GrayImage, ExtractionError> {
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(ExtractionError::Preprocessing("image has zero size".into()));
    }

    let gray = rgb_to_gray(&rgb);
    // Pixels strictly above the level become 255. A single-valued image yields level 0.
    let level = otsu_level(&gray);
    let binary = threshold(&gray, level);

    debug!(
        width = binary.width(),
        height = binary.height(),
        level,
        "Binarized image"
    );
    Ok(binary)
}

/// Encode a grayscale image as PNG (lossless).
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::Preprocessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Decode, binarize and re-encode as PNG, ready for the OCR engine.
pub fn preprocess_image(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let image = decode_image(bytes)?;
    let binary = binarize(&image)?;
    encode_png(&binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    /// Left half dark gray, right half light gray.
    fn bimodal(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([50, 50, 50])
            } else {
                Rgb([200, 200, 200])
            }
        })
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let rgb = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(rgb_to_gray(&rgb).get_pixel(0, 0).0[0], 76);

        let rgb = RgbImage::from_pixel(1, 1, Rgb([0, 255, 0]));
        assert_eq!(rgb_to_gray(&rgb).get_pixel(0, 0).0[0], 150);

        let rgb = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(rgb_to_gray(&rgb).get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let gray = rgb_to_gray(&bimodal(20, 10));
        let t = otsu_level(&gray);
        assert!((50..200).contains(&t), "threshold {t} should separate 50 from 200");
    }

    #[test]
    fn otsu_on_uniform_image_is_zero() {
        let gray = GrayImage::from_pixel(8, 8, Luma([255]));
        assert_eq!(otsu_level(&gray), 0);
    }

    #[test]
    fn binarize_keeps_dimensions_and_two_levels() {
        let img = DynamicImage::ImageRgb8(bimodal(31, 17));
        let binary = binarize(&img).unwrap();
        assert_eq!(binary.dimensions(), (31, 17));
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(30, 16).0[0], 255);
    }

    #[test]
    fn blank_white_page_stays_white() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let binary = binarize(&img).unwrap();
        assert!(binary.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = binarize(&img).unwrap_err();
        assert!(matches!(err, ExtractionError::Preprocessing(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(err.is_decode_failure());
        assert!(decode_image(&[]).unwrap_err().is_decode_failure());
    }

    #[test]
    fn gif_is_left_to_the_generic_loader() {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(bimodal(8, 4))
            .write_to(&mut cursor, ImageOutputFormat::Gif)
            .unwrap();
        let gif = cursor.into_inner();

        assert!(decode_image(&gif).unwrap_err().is_decode_failure());

        let png = load_original(&gif).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(image::load_from_memory(&png).unwrap().to_rgb8().dimensions(), (8, 4));
    }

    #[test]
    fn generic_loader_rejects_garbage_as_decode_failure() {
        assert!(load_original(b"definitely not an image").unwrap_err().is_decode_failure());
        assert!(load_original(&[]).unwrap_err().is_decode_failure());
    }

    #[test]
    fn preprocess_produces_grayscale_png() {
        let bytes = png_bytes(&bimodal(12, 6));
        let out = preprocess_image(&bytes).unwrap();
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&out).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
        assert_eq!(decoded.to_luma8().dimensions(), (12, 6));
    }
}
