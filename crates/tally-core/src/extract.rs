//! Document text extraction
//!
//! Turns an uploaded statement into plain text for the categorization prompt.
//! PDFs are read with `pdf-extract`; UTF-8 text documents pass through.

use tracing::debug;

use crate::error::{ExtractionError, Result};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Kinds of documents the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Sniff the document kind from its leading bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let trimmed = trim_leading_whitespace(bytes);
        if trimmed.starts_with(PDF_MAGIC) {
            return Some(Self::Pdf);
        }
        if std::str::from_utf8(bytes).is_ok() {
            return Some(Self::PlainText);
        }
        None
    }
}

/// Converts an opaque document into text
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Default extractor: PDF or plain text, chosen by content sniffing
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(ExtractionError::DocumentText("document is empty".into()).into());
        }

        let text = match DocumentKind::detect(bytes) {
            Some(DocumentKind::Pdf) => extract_pdf(bytes)?,
            Some(DocumentKind::PlainText) => String::from_utf8_lossy(bytes).into_owned(),
            None => {
                return Err(ExtractionError::DocumentText(
                    "unsupported document type (expected PDF or UTF-8 text)".into(),
                )
                .into())
            }
        };

        if text.trim().is_empty() {
            return Err(
                ExtractionError::DocumentText("document contains no extractable text".into())
                    .into(),
            );
        }

        debug!(chars = text.chars().count(), "Extracted statement text");
        Ok(text)
    }
}

/// pdf-extract panics on some malformed inputs; treat that like any other parse failure
fn extract_pdf(bytes: &[u8]) -> std::result::Result<String, ExtractionError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractionError::DocumentText(format!("unreadable PDF: {}", e))),
        Err(_) => Err(ExtractionError::DocumentText(
            "unreadable PDF: parser aborted".into(),
        )),
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}
