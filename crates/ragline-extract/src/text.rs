//! Plain-text and Markdown extractors.

use async_trait::async_trait;
use ragline_core::{
    DocumentExtractor, DocumentFormat, ExtractError, ExtractedText, ExtractionInfo,
};

/// Decode a payload as UTF-8, falling back to lossy decoding.
///
/// Returns the text and the encoding label recorded in metadata.
fn decode_utf8(bytes: &[u8]) -> (String, &'static str) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), "utf-8"),
        Err(_) => (String::from_utf8_lossy(bytes).into_owned(), "utf-8-lossy"),
    }
}

fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Extractor for plain UTF-8 text documents.
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new plain-text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for TextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let (text, encoding) = decode_utf8(bytes);
        let word_count = count_words(&text);
        Ok(ExtractedText {
            text,
            info: ExtractionInfo {
                page_count: None,
                section_count: None,
                word_count,
                encoding: encoding.to_string(),
            },
        })
    }
}

/// Extractor for Markdown documents.
///
/// The text passes through untouched so the chunker can attribute
/// sections from ATX headings; extraction only counts them.
pub struct MarkdownExtractor;

impl MarkdownExtractor {
    /// Create a new Markdown extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for MarkdownExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let (text, encoding) = decode_utf8(bytes);
        let section_count = text.lines().filter(|line| is_atx_heading(line)).count() as u32;
        let word_count = count_words(&text);
        Ok(ExtractedText {
            text,
            info: ExtractionInfo {
                page_count: None,
                section_count: Some(section_count),
                word_count,
                encoding: encoding.to_string(),
            },
        })
    }
}

fn is_atx_heading(line: &str) -> bool {
    let hashes = line.len() - line.trim_start_matches('#').len();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}
