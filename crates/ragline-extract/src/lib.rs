//! # ragline-extract
//!
//! Document text extraction. Each supported [`DocumentFormat`] has a
//! dedicated extractor behind the [`DocumentExtractor`] trait; the
//! [`ExtractorRegistry`] dispatches on the declared format tag and
//! enforces the payload size ceiling before any parsing happens.
//!
//! Extractors only transform bytes — nothing here persists anything.
//!
//! [`DocumentFormat`]: ragline_core::DocumentFormat
//! [`DocumentExtractor`]: ragline_core::DocumentExtractor

mod docx;
mod pdf;
mod registry;
mod text;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use text::{MarkdownExtractor, TextExtractor};
