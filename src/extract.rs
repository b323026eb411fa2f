//! Text extraction from uploaded documents.
//!
//! Dispatch is on the filename extension. Unsupported files are reported as
//! [`Extraction::Skipped`] instead of failing the whole upload.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::documents::Document;

/// Errors from reading a supported document.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Document format, decided from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    /// Classify a filename by its (case-insensitive) extension.
    pub fn from_filename(filename: &str) -> Self {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return Self::Unsupported;
        };

        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "text" | "md" | "markdown" => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Outcome of extracting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Raw text of a supported document (may be empty).
    Text(String),
    /// The document was not read because its format is not supported.
    Skipped(DocumentKind),
}

/// Extract the raw text of a document.
///
/// PDF parsing is CPU bound; async callers should run this on the blocking pool.
pub fn extract_text(document: &Document) -> Result<Extraction, ExtractError> {
    let kind = DocumentKind::from_filename(&document.filename);
    crate::debug_event!(
        "extract",
        "start",
        "{} ({}, {} bytes)",
        document.filename,
        kind.as_str(),
        document.bytes.len()
    );

    let text = match kind {
        DocumentKind::Pdf => extract_pdf(&document.bytes)?,
        DocumentKind::Docx => extract_docx(&document.bytes)?,
        DocumentKind::PlainText => extract_plain(&document.bytes)?,
        DocumentKind::Unsupported => return Ok(Extraction::Skipped(kind)),
    };

    Ok(Extraction::Text(text))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_plain(bytes: &[u8]) -> Result<String, ExtractError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Paragraph open/close tags, text runs, tabs and line breaks, in document order.
///
/// `<w:pPr>`, `<w:tab>` and `<w:txbxContent>` share prefixes with these tags
/// but never match them.
static DOCX_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>",
        r"|</?w:p(?:\s[^>]*)?/?>",
        r"|<w:tab\s*/>|<w:br(?:\s[^>]*)?/>|<w:cr\s*/>",
    ))
    .expect("docx token pattern is valid")
});

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    Ok(docx_xml_to_text(&xml))
}

/// Flatten WordprocessingML into text, one line per paragraph.
///
/// Paragraphs nested inside another paragraph (text boxes) do not contribute
/// to it, so the outer paragraph keeps the text on both sides of the box.
fn docx_xml_to_text(xml: &str) -> String {
    let mut text = String::new();
    let mut depth = 0usize;

    for token in DOCX_TOKEN.captures_iter(xml) {
        let tag = &token[0];
        if let Some(run) = token.get(1) {
            if depth == 1 {
                text.push_str(&unescape_xml(run.as_str()));
            }
        } else if tag.starts_with("</w:p") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                text.push('\n');
            }
        } else if tag.starts_with("<w:p") {
            if !tag.ends_with("/>") {
                depth += 1;
            } else if depth == 0 {
                text.push('\n');
            }
        } else if depth == 1 {
            text.push(if tag.starts_with("<w:tab") { '\t' } else { '\n' });
        }
    }

    text
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
