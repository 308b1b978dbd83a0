//! Plain-text extraction for resume documents (PDF, DOCX).
//!
//! The batch picks the format by file extension, the HTTP surface by MIME type.
//! Both end up here and get trimmed UTF-8 text back, or an `ExtractError` the
//! caller records against that one file.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// Legacy Word MIME type; accepted and parsed as DOCX.
pub const MIME_MSWORD: &str = "application/msword";

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("no text could be extracted from the file")]
    Empty,
}

/// Resume formats the screener accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Case-insensitive match on the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            MIME_PDF => Some(DocumentKind::Pdf),
            MIME_DOCX | MIME_MSWORD => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

/// Extracts trimmed text from `bytes`. Empty output is an error.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    let text = match kind {
        DocumentKind::Pdf => extract_pdf(bytes)?,
        DocumentKind::Docx => extract_docx(bytes)?,
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text.to_string())
}

/// Reads `path` and extracts its text, choosing the format from the extension.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| ExtractError::Unsupported(path.display().to_string()))?;
    let bytes = std::fs::read(path).map_err(|e| match kind {
        DocumentKind::Pdf => ExtractError::Pdf(e.to_string()),
        DocumentKind::Docx => ExtractError::Docx(e.to_string()),
    })?;
    extract_text(&bytes, kind)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    paragraphs_from_document_xml(&doc_xml)
}

/// Collects `w:t` runs, one line per `w:p` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
