//! PDF text extractor.
//!
//! Uses pdf-extract for text extraction. Page boundaries (form feeds in
//! the extracted stream) are rewritten as `--- Page N ---` marker lines
//! so the chunker can attribute page numbers to chunks.

use async_trait::async_trait;
use ragline_core::{
    DocumentExtractor, DocumentFormat, ExtractError, ExtractedText, ExtractionInfo,
};
use tracing::debug;

/// Extractor for PDF documents.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Create a new PDF extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        debug!(size = bytes.len(), "extracting pdf");

        // pdf-extract is CPU-bound and synchronous
        let raw = {
            let bytes = bytes.to_vec();
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ExtractError::Parse(format!("extraction task failed: {e}")))?
                .map_err(|e| ExtractError::Parse(e.to_string()))?
        };

        let (text, page_count) = insert_page_markers(&raw);
        let word_count = text.split_whitespace().count() as u64;

        Ok(ExtractedText {
            text,
            info: ExtractionInfo {
                page_count: Some(page_count),
                section_count: None,
                word_count,
                encoding: "utf-8".to_string(),
            },
        })
    }
}

/// Rewrite form-feed page breaks as marker lines.
fn insert_page_markers(raw: &str) -> (String, u32) {
    let pages: Vec<&str> = raw.split('\x0C').collect();
    let mut text = String::with_capacity(raw.len() + pages.len() * 16);

    let mut page_count = 0u32;
    for (i, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            continue;
        }
        page_count += 1;
        if page_count > 1 {
            text.push('\n');
        }
        text.push_str(&format!("--- Page {} ---\n", i + 1));
        text.push_str(page.trim_matches('\n'));
        text.push('\n');
    }

    (text, page_count.max(1))
}
