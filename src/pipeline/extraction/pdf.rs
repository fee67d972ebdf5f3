use std::collections::HashMap;

use super::types::{PageText, PdfExtractor};
use super::ExtractionError;

/// Embedded text layer extraction with lopdf, one page at a time so a single
/// unreadable page does not cost the rest of the document.
pub struct LopdfTextExtractor;

impl PdfExtractor for LopdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let document = lopdf::Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        // get_pages() is keyed by 1-based page number, in order.
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        tracing::debug!(pages = page_numbers.len(), "Opened PDF");

        let pages = page_numbers
            .into_iter()
            .map(|number| {
                document
                    .extract_text(&[number])
                    .map_err(|e| ExtractionError::PdfParsing(format!("page {number}: {e}")))
            })
            .collect();

        Ok(pages)
    }
}

/// Scripted text layer for orchestrator tests.
///
/// Pages listed in `failing` return a parsing error; `open_error` fails the
/// whole document.
pub struct MockPdfExtractor {
    pages: Vec<String>,
    failing: HashMap<usize, String>,
    open_error: Option<String>,
}

impl MockPdfExtractor {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            failing: HashMap::new(),
            open_error: None,
        }
    }

    /// Make the 1-based `page_number` fail with `reason`.
    pub fn with_failing_page(mut self, page_number: usize, reason: &str) -> Self {
        self.failing.insert(page_number, reason.to_string());
        self
    }

    pub fn unreadable(reason: &str) -> Self {
        Self {
            pages: vec![],
            failing: HashMap::new(),
            open_error: Some(reason.to_string()),
        }
    }
}

impl PdfExtractor for MockPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        if let Some(reason) = &self.open_error {
            return Err(ExtractionError::PdfParsing(reason.clone()));
        }
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(i, text)| match self.failing.get(&(i + 1)) {
                Some(reason) => Err(ExtractionError::PdfParsing(reason.clone())),
                None => Ok(text.clone()),
            })
            .collect())
    }
}

/// Build a real PDF with one page per entry. `None` yields a page without a
/// text layer (a stand-in for a scanned page).
#[cfg(test)]
pub(crate) fn build_test_pdf(pages: &[Option<&str>]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = match text {
            Some(text) => format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET"),
            None => String::new(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
