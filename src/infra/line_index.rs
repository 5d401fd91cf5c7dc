//! Line metrics for generated-position accounting.
//!
//! Goals
//! - Single memchr pass over bytes to count '\n'.
//! - CRLF counts as one terminator (the '\r' is part of the line text).
//! - Widths are measured in UTF-16 code units, the unit source map columns use.
//!
//! Notes
//! - An empty buffer has 0 terminators and a tail width of 0.
//! - The tail is the text after the last '\n' (the whole buffer if none).

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStats {
    /// Number of '\n' bytes in the buffer.
    pub newlines: usize,
    /// UTF-16 width of the text following the last '\n'.
    pub tail_width: usize,
}

impl LineStats {
    pub fn of(text: &str) -> Self {
        let bytes = text.as_bytes();
        let newlines = memchr::memchr_iter(b'\n', bytes).count();

        // Tail starts one past the last newline, if any.
        let tail_start = memchr::memrchr(b'\n', bytes).map_or(0, |pos| pos + 1);

        Self {
            newlines,
            tail_width: utf16_width(&text[tail_start..]),
        }
    }
}

/// Width of `text` in UTF-16 code units.
pub fn utf16_width(text: &str) -> usize {
    // ASCII fast path: one unit per byte.
    if text.is_ascii() {
        return text.len();
    }
    text.chars().map(char::len_utf16).sum()
}

/// Rewrite CRLF line endings to LF, borrowing when there is nothing to do.
pub fn ensure_posix_eol(text: &str) -> Cow<'_, str> {
    if memchr::memmem::find(text.as_bytes(), b"\r\n").is_none() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n"))
}
