//! Extractor registry with format-tag dispatch.

use ragline_core::types::DEFAULT_MAX_DOCUMENT_BYTES;
use ragline_core::{DocumentExtractor, DocumentFormat, ExtractError, ExtractedText};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of document extractors, keyed by declared format.
///
/// Dispatch is by the format tag the caller declares, not by content
/// sniffing; an unregistered format is an `UnsupportedFormat` error.
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Arc<dyn DocumentExtractor>>,
    max_bytes: u64,
}

impl ExtractorRegistry {
    /// Create an empty registry with the default 10 MiB payload ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Create a registry with every built-in extractor registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::TextExtractor::new());
        registry.register(crate::MarkdownExtractor::new());
        registry.register(crate::PdfExtractor::new());
        registry.register(crate::DocxExtractor::new());
        registry
    }

    /// Override the payload size ceiling in bytes.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Register an extractor under its declared format.
    pub fn register<E: DocumentExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.insert(extractor.format(), Arc::new(extractor));
    }

    /// Get the extractor for a format.
    #[must_use]
    pub fn get(&self, format: DocumentFormat) -> Option<Arc<dyn DocumentExtractor>> {
        self.extractors.get(&format).cloned()
    }

    /// Extract text from a raw payload.
    ///
    /// Rejects oversized payloads before dispatch; unregistered formats
    /// fail with `UnsupportedFormat`.
    pub async fn extract(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<ExtractedText, ExtractError> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(ExtractError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        let extractor = self
            .get(format)
            .ok_or_else(|| ExtractError::UnsupportedFormat(format.to_string()))?;

        debug!(format = %format, size = bytes.len(), "extracting document");
        extractor.extract(bytes).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
