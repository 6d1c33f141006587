//! Bounded diagnostic excerpts.
//!
//! Raw diagnostic text (extractor stderr, I/O error messages, upstream
//! errors) is never placed in a response body unbounded.

/// Maximum number of characters of diagnostic text returned to a caller.
pub const DETAILS_MAX_CHARS: usize = 500;

/// Marker appended to text that was cut short.
const ELLIPSIS: char = '…';

/// Keep the first `max_chars` characters of `text` (trimmed).
///
/// Truncation happens on a `char` boundary so multi-byte text never panics.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((idx, _)) => {
            let mut out = text[..idx].to_string();
            out.push(ELLIPSIS);
            out
        }
    }
}

/// Keep the last `max_chars` characters of `text` (trimmed).
///
/// Used for process stderr, where the failure reason is usually at the end.
pub fn tail_excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let skip = total - max_chars;
    let mut out = String::with_capacity(text.len());
    out.push(ELLIPSIS);
    out.extend(text.chars().skip(skip));
    out
}
