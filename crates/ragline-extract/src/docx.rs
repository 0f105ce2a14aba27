//! DOCX text extractor.
//!
//! A DOCX file is a zip container; the document body lives in
//! `word/document.xml`. Text runs (`<w:t>`) are concatenated, with
//! paragraph ends (`</w:p>`) becoming blank lines so the chunker sees
//! paragraph structure.

use async_trait::async_trait;
use ragline_core::{
    DocumentExtractor, DocumentFormat, ExtractError, ExtractedText, ExtractionInfo,
};
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Extractor for word-processor (DOCX) documents.
pub struct DocxExtractor {
    tag_re: Regex,
    break_re: Regex,
}

impl DocxExtractor {
    /// Create a new DOCX extractor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // any remaining xml tag after paragraph handling
            tag_re: Regex::new(r"<[^>]+>").expect("valid tag regex"),
            break_re: Regex::new(r"<w:br[^>]*/?>").expect("valid break regex"),
        }
    }

    fn document_xml(bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractError::Parse(format!("not a zip container: {e}")))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Parse(format!("missing word/document.xml: {e}")))?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| ExtractError::Parse(format!("unreadable document.xml: {e}")))?;
        Ok(xml)
    }

    fn xml_to_text(&self, xml: &str) -> (String, u32) {
        let paragraph_count = xml.matches("</w:p>").count() as u32;

        let with_paragraphs = xml.replace("</w:p>", "\n\n");
        let with_breaks = self.break_re.replace_all(&with_paragraphs, "\n");
        let stripped = self.tag_re.replace_all(&with_breaks, "");
        let decoded = decode_entities(&stripped);

        // collapse runs of 3+ newlines left by empty paragraphs
        let mut text = String::with_capacity(decoded.len());
        let mut newlines = 0usize;
        for c in decoded.chars() {
            if c == '\n' {
                newlines += 1;
                if newlines <= 2 {
                    text.push(c);
                }
            } else {
                newlines = 0;
                text.push(c);
            }
        }

        (text.trim().to_string(), paragraph_count)
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        debug!(size = bytes.len(), "extracting docx");

        let xml = Self::document_xml(bytes)?;
        let (text, paragraph_count) = self.xml_to_text(&xml);
        let word_count = text.split_whitespace().count() as u64;

        Ok(ExtractedText {
            text,
            info: ExtractionInfo {
                page_count: None,
                section_count: Some(paragraph_count),
                word_count,
                encoding: "utf-8".to_string(),
            },
        })
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
