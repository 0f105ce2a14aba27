//! Token estimation.
//!
//! The pipeline does not ship a real tokenizer; it uses the same
//! characters-per-token estimate everywhere so that chunk sizing, budget
//! accounting and input truncation agree with each other.

/// Approximate characters per token for English-ish text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text span.
///
/// Rounds up, so a non-empty text always counts at least one token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Longest prefix of `text` that fits within `max_tokens`, cut on a char
/// boundary. Returns the prefix and whether anything was cut.
#[must_use]
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> (&str, bool) {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}
