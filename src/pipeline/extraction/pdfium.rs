//! PDF page rasterization via Google PDFium.
//!
//! Pages with no text layer are rendered to PNG here before binarization and
//! OCR. `PdfiumRenderer` is stateless (`Send + Sync`): each call creates a
//! fresh `Pdfium` instance because the upstream type is `!Send`. The OS caches
//! `dlopen`, so repeat loads are near-free.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{ImageOutputFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG images using Google PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a new renderer, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library file)
/// 2. Alongside the running executable, then `<exe_dir>/lib`
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings =
            Pdfium::bind_to_library(&path).map_err(|e| ExtractionError::PdfRendering {
                page: 0,
                reason: format!("Failed to load PDFium from {path}: {e}"),
            })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for dir in [exe_dir.to_path_buf(), exe_dir.join("lib")] {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium next to executable");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings =
        Pdfium::bind_to_system_library().map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!(
                "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
            ),
        })?;
    Ok(Pdfium::new(bindings))
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let page_number = page_index + 1;
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| ExtractionError::PdfParsing(format!("PDFium could not open PDF: {e}")))?;

        let pages = document.pages();
        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PdfRendering {
            page: page_number,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;

        let page = pages.get(index).map_err(|_| ExtractionError::PdfRendering {
            page: page_number,
            reason: format!("Page out of range (document has {} pages)", pages.len()),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, dpi);

        let uncapped_w = (width_points * dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w < uncapped_w {
            warn!(
                page = page_number,
                raw_width = uncapped_w,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("PNG encoding failed: {e}"),
            })?;
        let png_bytes = cursor.into_inner();

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            dpi,
            "Rendered PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

/// Mock renderer for orchestrator and processor tests (no PDFium needed).
///
/// Renders a small white PNG per page. Indices in `failing` return a render
/// error; indices in `garbled` return bytes that are not an image. Every call
/// is recorded in the shared [`RenderLog`].
pub struct MockPdfPageRenderer {
    page_count: usize,
    failing: Vec<usize>,
    garbled: Vec<usize>,
    log: RenderLog,
}

/// `(page_index, dpi)` for each render request, shared with the test.
pub type RenderLog = Arc<Mutex<Vec<(usize, u32)>>>;

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            failing: vec![],
            garbled: vec![],
            log: RenderLog::default(),
        }
    }

    /// Handle to the call record; stays valid after the renderer is boxed.
    pub fn log(&self) -> RenderLog {
        Arc::clone(&self.log)
    }

    pub fn failing_on(mut self, page_index: usize) -> Self {
        self.failing.push(page_index);
        self
    }

    pub fn garbled_on(mut self, page_index: usize) -> Self {
        self.garbled.push(page_index);
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if let Ok(mut log) = self.log.lock() {
            log.push((page_index, dpi));
        }
        if page_index >= self.page_count || self.failing.contains(&page_index) {
            return Err(ExtractionError::PdfRendering {
                page: page_index + 1,
                reason: format!("mock render failure (mock has {} pages)", self.page_count),
            });
        }
        if self.garbled.contains(&page_index) {
            return Ok(b"\x89PNG truncated".to_vec());
        }
        blank_png(8, 8)
    }
}

fn blank_png(width: u32, height: u32) -> Result<Vec<u8>, ExtractionError> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::Preprocessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
