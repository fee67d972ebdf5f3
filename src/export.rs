//! Report export: the extracted text, its summary and the sentiment label
//! written out as DOCX or PDF.
//!
//! Both writers report success as a plain `bool`. Failures are logged with
//! the target path and never propagate to the caller.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const REPORT_TITLE: &str = "Analysis Report";
pub const TEXT_HEADING: &str = "Full Extracted Text";
pub const SUMMARY_HEADING: &str = "Summary";
pub const SENTIMENT_HEADING: &str = "Sentiment Analysis";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("DOCX packaging failed: {0}")]
    Docx(String),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Docx(err.to_string())
    }
}

/// Requested conversion for an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRequest {
    #[default]
    None,
    Pdf,
    Docx,
}

impl ExportRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// File extension of the produced artifact, `None` when nothing is exported.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Pdf => Some("pdf"),
            Self::Docx => Some("docx"),
        }
    }
}

impl FromStr for ExportRequest {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Write the report in the requested format. `ExportRequest::None` is a no-op
/// that reports `false`, as nothing was written.
pub fn export_report(
    request: ExportRequest,
    path: &Path,
    extracted_text: &str,
    summary: &str,
    sentiment: &str,
) -> bool {
    match request {
        ExportRequest::None => false,
        ExportRequest::Pdf => save_as_pdf(path, extracted_text, summary, sentiment),
        ExportRequest::Docx => save_as_docx(path, extracted_text, summary, sentiment),
    }
}

// ─── DOCX ─────────────────────────────────────────────────────────────────────

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:sz w:val="52"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
</w:styles>"#;

/// Save the report as a Word document. Returns `true` when the file was written.
pub fn save_as_docx(path: &Path, extracted_text: &str, summary: &str, sentiment: &str) -> bool {
    tracing::info!(path = %path.display(), "Saving report as DOCX");
    match write_docx(path, extracted_text, summary, sentiment) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "DOCX report saved");
            true
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to save DOCX report");
            false
        }
    }
}

fn write_docx(
    path: &Path,
    extracted_text: &str,
    summary: &str,
    sentiment: &str,
) -> Result<(), ExportError> {
    let document = docx_document_xml(extracted_text, summary, sentiment);

    let file = File::create(path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default();

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
        ("word/styles.xml", STYLES_XML),
        ("word/document.xml", document.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

fn docx_document_xml(extracted_text: &str, summary: &str, sentiment: &str) -> String {
    let mut body = String::new();
    body.push_str(&styled_paragraph("Title", REPORT_TITLE));

    body.push_str(&styled_paragraph("Heading1", TEXT_HEADING));
    push_line_paragraphs(&mut body, extracted_text);
    body.push_str("<w:p/>");

    body.push_str(&styled_paragraph("Heading1", SUMMARY_HEADING));
    push_line_paragraphs(&mut body, summary);
    body.push_str("<w:p/>");

    body.push_str(&styled_paragraph("Heading1", SENTIMENT_HEADING));
    body.push_str(&format!(
        "<w:p><w:r><w:rPr><w:b/></w:rPr>{}</w:r></w:p>",
        text_element(sentiment)
    ));

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}</w:body></w:document>"
        ),
        body
    )
}

fn styled_paragraph(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr><w:r>{}</w:r></w:p>"#,
        text_element(text)
    )
}

/// One paragraph per input line; blank lines become empty paragraphs.
fn push_line_paragraphs(body: &mut String, text: &str) {
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            body.push_str("<w:p/>");
        } else {
            body.push_str(&format!("<w:p><w:r>{}</w:r></w:p>", text_element(line)));
        }
    }
}

fn text_element(text: &str) -> String {
    format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape(strip_xml_invalid(text).as_str()))
}

/// XML 1.0 forbids most C0 control characters, even escaped.
fn strip_xml_invalid(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

// ─── PDF ──────────────────────────────────────────────────────────────────────

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_LEFT: Mm = Mm(20.0);
const TOP_Y: Mm = Mm(280.0);
const BOTTOM_Y: Mm = Mm(20.0);

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;

/// Helvetica at 12pt fits roughly this many average characters in 170mm.
const BODY_WRAP_CHARS: usize = 80;
const BODY_LINE_HEIGHT: Mm = Mm(5.5);

/// Save the report as PDF. Returns `true` when the file was written.
pub fn save_as_pdf(path: &Path, extracted_text: &str, summary: &str, sentiment: &str) -> bool {
    tracing::info!(path = %path.display(), "Saving report as PDF");
    let written = render_pdf(extracted_text, summary, sentiment).and_then(|bytes| {
        std::fs::write(path, bytes)?;
        Ok(())
    });
    match written {
        Ok(()) => {
            tracing::info!(path = %path.display(), "PDF report saved");
            true
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to save PDF report");
            false
        }
    }
}

/// Cursor over the current page; starts a new page when the next line would
/// cross the bottom margin.
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: Mm,
    pages: usize,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page1, layer1) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(format!("PDF font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(format!("PDF font error: {e}")))?;
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: TOP_Y,
            pages: 1,
        })
    }

    fn ensure_room(&mut self, height: Mm) {
        if self.y - height < BOTTOM_Y {
            self.pages += 1;
            let (page, layer) =
                self.doc
                    .add_page(PAGE_WIDTH, PAGE_HEIGHT, format!("Layer {}", self.pages));
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP_Y;
        }
    }

    fn line(&mut self, text: &str, size: f32, bold: bool, height: Mm) {
        self.ensure_room(height);
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(to_latin1(text), size, MARGIN_LEFT, self.y, font);
        self.y -= height;
    }

    fn heading(&mut self, text: &str, size: f32, after: Mm) {
        self.line(text, size, true, after);
    }

    fn paragraphs(&mut self, text: &str, bold: bool) {
        for raw in text.split('\n') {
            for line in wrap_text(raw, BODY_WRAP_CHARS) {
                self.line(&line, BODY_SIZE, bold, BODY_LINE_HEIGHT);
            }
        }
    }

    fn gap(&mut self, height: Mm) {
        self.y -= height;
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| ExportError::Pdf(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ExportError::Pdf(format!("PDF buffer error: {e}")))
    }
}

fn render_pdf(extracted_text: &str, summary: &str, sentiment: &str) -> Result<Vec<u8>, ExportError> {
    let mut pdf = PdfWriter::new(REPORT_TITLE)?;

    pdf.heading(REPORT_TITLE, TITLE_SIZE, Mm(14.0));

    pdf.heading(TEXT_HEADING, HEADING_SIZE, Mm(8.0));
    pdf.paragraphs(extracted_text, false);
    pdf.gap(Mm(4.0));

    pdf.heading(SUMMARY_HEADING, HEADING_SIZE, Mm(8.0));
    pdf.paragraphs(summary, false);
    pdf.gap(Mm(4.0));

    pdf.heading(SENTIMENT_HEADING, HEADING_SIZE, Mm(8.0));
    pdf.paragraphs(sentiment, true);

    pdf.finish()
}

/// Built-in PDF fonts cover Latin-1 only; anything outside becomes `?`.
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_control() => '?',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        // Hard-split words longer than a full line.
        let mut word = word;
        while word.chars().count() > max_chars {
            let split = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
