//! Codepoint-at-a-time UTF-8 decoding over raw byte slices.
//!
//! Learning input arrives as bytes, so malformed sequences are expected and must not abort
//! tokenization. The decoder reports them as an empty read and leaves the cursor in place;
//! callers treat whatever is left as an opaque symbol.

/// Returns the encoded length announced by a UTF-8 lead byte, or `None` for a continuation
/// or invalid lead byte.
#[inline]
#[must_use]
pub fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

/// Returns `true` for `10xxxxxx` bytes.
#[inline]
#[must_use]
pub fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Decodes the codepoint starting at `bytes[0]`, returning it as a string slice.
///
/// Returns `None` for an empty input, a truncated sequence, a bad continuation byte, or an
/// encoding the standard library rejects (overlong forms, surrogates).
#[must_use]
pub fn read_codepoint(bytes: &[u8]) -> Option<&str> {
    let len = utf8_len(*bytes.first()?)?;
    let encoded = bytes.get(..len)?;
    if !encoded[1..].iter().all(|&b| is_continuation(b)) {
        return None;
    }
    std::str::from_utf8(encoded).ok()
}

/// Forward cursor yielding one codepoint at a time.
#[derive(Debug, Clone, Copy)]
pub struct Utf8Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Utf8Cursor<'a> {
    /// Creates a cursor positioned at the start of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Codepoint under the cursor without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&'a str> {
        read_codepoint(&self.bytes[self.pos..])
    }

    /// Codepoint following the one under the cursor.
    #[must_use]
    pub fn peek_second(&self) -> Option<&'a str> {
        let first = self.peek()?;
        read_codepoint(&self.bytes[self.pos + first.len()..])
    }

    /// Consumes and returns the codepoint under the cursor.
    pub fn bump(&mut self) -> Option<&'a str> {
        let cp = self.peek()?;
        self.pos += cp.len();
        Some(cp)
    }

    /// Consumes `prefix` if the remaining input starts with it.
    pub fn eat_prefix(&mut self, prefix: &str) -> bool {
        if !prefix.is_empty() && self.remaining().starts_with(prefix.as_bytes()) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Bytes consumed since `mark`.
    #[must_use]
    pub fn since(&self, mark: usize) -> &'a [u8] {
        &self.bytes[mark..self.pos]
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// `true` once every byte has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}
