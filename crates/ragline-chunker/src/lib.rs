//! # ragline-chunker
//!
//! Recursive chunking of extracted text into overlapping, size-bounded
//! pieces. Splitting walks a separator hierarchy — paragraph breaks,
//! sentence breaks, whitespace, hard character cut — and is fully
//! deterministic in (text, config), which the pipeline relies on for
//! idempotent reprocessing.

use async_trait::async_trait;
use ragline_core::tokens::CHARS_PER_TOKEN;
use ragline_core::{estimate_tokens, ChunkConfig, ChunkError, ChunkPiece, Chunker};

/// Recursive chunker with a paragraph → sentence → whitespace → hard-cut
/// separator hierarchy.
pub struct RecursiveChunker;

impl RecursiveChunker {
    /// Create a new recursive chunker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chunker for RecursiveChunker {
    fn name(&self) -> &str {
        "recursive"
    }

    async fn split(&self, text: &str, config: &ChunkConfig) -> Result<Vec<ChunkPiece>, ChunkError> {
        config.validate()?;
        Ok(split_text(text, config))
    }
}

/// Structural markers found in the text, by char offset.
struct Markers {
    /// (char offset of the marker line, page number)
    pages: Vec<(usize, u32)>,
    /// (char offset of the heading line, heading text)
    sections: Vec<(usize, String)>,
}

impl Markers {
    fn scan(text: &str) -> Self {
        let mut pages = Vec::new();
        let mut sections = Vec::new();
        let mut offset = 0usize;

        for line in text.split('\n') {
            if let Some(page) = parse_page_marker(line) {
                pages.push((offset, page));
            } else if let Some(section) = parse_heading(line) {
                sections.push((offset, section));
            }
            offset += line.chars().count() + 1;
        }

        Self { pages, sections }
    }

    /// Attribution for a chunk starting at `char_idx`: the nearest marker
    /// at or before that position.
    fn at(&self, char_idx: usize) -> (Option<u32>, Option<String>) {
        let page = self
            .pages
            .partition_point(|(offset, _)| *offset <= char_idx)
            .checked_sub(1)
            .map(|i| self.pages[i].1);
        let section = self
            .sections
            .partition_point(|(offset, _)| *offset <= char_idx)
            .checked_sub(1)
            .map(|i| self.sections[i].1.clone());
        (page, section)
    }
}

/// Parse a `--- Page N ---` line inserted by the PDF extractor.
fn parse_page_marker(line: &str) -> Option<u32> {
    line.trim_end()
        .strip_prefix("--- Page ")?
        .strip_suffix(" ---")?
        .parse()
        .ok()
}

/// Parse a Markdown ATX heading (`#` through `######`).
fn parse_heading(line: &str) -> Option<String> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    let title = rest.strip_prefix(' ')?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn split_text(text: &str, config: &ChunkConfig) -> Vec<ChunkPiece> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    // byte_at[i] = byte offset of char i; byte_at[total] = text length
    let mut byte_at: Vec<usize> = Vec::with_capacity(total + 1);
    byte_at.extend(text.char_indices().map(|(i, _)| i));
    byte_at.push(text.len());

    let markers = Markers::scan(text);

    let target_chars = config.size * CHARS_PER_TOKEN;
    let overlap_chars = config.overlap * CHARS_PER_TOKEN;

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + target_chars).min(total);
        let (end, truncated) = if hard_end == total {
            (total, false)
        } else {
            match find_split(&chars, start, hard_end) {
                Some(end) => (end, false),
                None => (hard_end, true),
            }
        };

        let content: String = chars[start..end].iter().collect();
        if !content.trim().is_empty() {
            let (page, section) = markers.at(start);
            let token_count = estimate_tokens(&content);
            pieces.push(ChunkPiece {
                content,
                byte_range: byte_at[start] as u64..byte_at[end] as u64,
                token_count,
                page,
                section,
                truncated,
            });
        }

        if end >= total {
            break;
        }
        // re-include the trailing overlap at the head of the next piece
        let next = end.saturating_sub(overlap_chars);
        start = if next > start { next } else { end };
    }

    pieces
}

/// Find the split point closest to, but not exceeding, `hard_end`.
///
/// Tries each separator level in turn over the whole window; the first
/// level with any split point under the size wins.
fn find_split(chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
    // paragraph break: split just after a blank line
    for i in (start + 2..=hard_end).rev() {
        if chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return Some(i);
        }
    }

    // sentence break: terminator followed by whitespace
    for i in (start + 1..hard_end).rev() {
        let c = chars[i - 1];
        if (c == '.' || c == '!' || c == '?') && chars[i].is_whitespace() {
            return Some(i);
        }
    }

    // any whitespace
    for i in (start + 1..=hard_end).rev() {
        if chars[i - 1].is_whitespace() {
            return Some(i);
        }
    }

    None
}
