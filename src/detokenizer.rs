//! Renders a token stream back into readable text.

use std::io::{self, Write};

use crate::error::{Result, WeaveError};
use crate::token::{Category, Token};

/// Token sink that restores spacing and sentence capitalization.
///
/// The writer remembers the category of the last token written. Content following START
/// or a stop is capitalized; separating spaces depend on what came before. END terminates
/// the line, after which only a new START (or another END) is accepted.
///
/// ```
/// use wordweave::{Category, TextWriter, Token};
///
/// let mut writer = TextWriter::new(Vec::new());
/// for token in [
///     Token::start(),
///     Token::word("hello"),
///     Token::new(Category::RightDelim, ","),
///     Token::word("world"),
///     Token::new(Category::RightStop, "!"),
///     Token::end(),
/// ] {
///     writer.write(&token)?;
/// }
/// assert_eq!(writer.into_inner(), b"Hello, world!\n");
/// # Ok::<(), wordweave::WeaveError>(())
/// ```
#[derive(Debug)]
pub struct TextWriter<W> {
    sink: W,
    state: Category,
}

impl<W: Write> TextWriter<W> {
    /// Wraps `sink`; the writer starts as if START had just been written.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: Category::Start,
        }
    }

    /// Category of the last token accepted.
    #[must_use]
    pub fn state(&self) -> Category {
        self.state
    }

    /// Writes one token.
    ///
    /// Returns [`WeaveError::Protocol`] without touching the state when START arrives
    /// mid-line or content arrives after END. IO failures surface as [`WeaveError::Io`].
    pub fn write(&mut self, token: &Token) -> Result<()> {
        let prev = self.state;
        let next = token.category();
        match next {
            Category::Start => {
                if !matches!(prev, Category::Start | Category::End) {
                    return Err(WeaveError::Protocol {
                        state: prev,
                        attempted: next,
                    });
                }
            }
            Category::End => self.emit(b"\n")?,
            _ if prev == Category::End => {
                return Err(WeaveError::Protocol {
                    state: prev,
                    attempted: next,
                });
            }
            Category::Word | Category::Symbol | Category::Int | Category::Decimal => {
                if prev.is_content()
                    || matches!(prev, Category::RightDelim | Category::RightStop)
                {
                    self.emit(b" ")?;
                }
                if prev == Category::Start || prev.is_stop() {
                    self.emit(capitalize(token.text()).as_bytes())?;
                } else {
                    self.emit(token.text().as_bytes())?;
                }
            }
            Category::LeftDelim | Category::LeftStop => {
                if prev.is_content()
                    || matches!(prev, Category::RightDelim | Category::RightStop)
                {
                    self.emit(b" ")?;
                }
                self.emit(token.text().as_bytes())?;
            }
            Category::RightDelim | Category::RightStop => self.emit(token.text().as_bytes())?,
        }
        self.state = next;
        Ok(())
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().map_err(|err| WeaveError::io(err, None))
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink
            .write_all(bytes)
            .map_err(|err| WeaveError::io(err, None))
    }
}

impl TextWriter<Vec<u8>> {
    /// Renders a whole token sequence into a string.
    pub fn render<'t, I>(tokens: I) -> Result<String>
    where
        I: IntoIterator<Item = &'t Token>,
    {
        let mut writer = Self::new(Vec::new());
        for token in tokens {
            writer.write(token)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|err| WeaveError::io(io::Error::new(io::ErrorKind::InvalidData, err), None))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(category: Category, text: &str) -> Token {
        Token::new(category, text)
    }

    #[test]
    fn spacing_follows_previous_category() {
        let tokens = [
            Token::start(),
            tok(Category::LeftStop, "¿"),
            tok(Category::Word, "qué"),
            tok(Category::RightStop, "?"),
            tok(Category::Word, "nada"),
            tok(Category::LeftDelim, "("),
            tok(Category::Int, "3"),
            tok(Category::Word, "veces"),
            tok(Category::RightDelim, ")"),
            tok(Category::Decimal, "2.5"),
            tok(Category::RightStop, "."),
            Token::end(),
        ];
        let text = TextWriter::render(&tokens).expect("render");
        assert_eq!(text, "¿Qué? Nada (3 veces) 2.5.\n");
    }

    #[test]
    fn start_mid_line_is_rejected_without_state_change() {
        let mut writer = TextWriter::new(Vec::new());
        writer.write(&Token::word("one")).expect("content");
        let err = writer.write(&Token::start()).expect_err("start mid-line");
        assert!(matches!(
            err,
            WeaveError::Protocol {
                state: Category::Word,
                attempted: Category::Start
            }
        ));
        assert_eq!(writer.state(), Category::Word);
        writer.write(&Token::word("two")).expect("still writable");
        assert_eq!(writer.into_inner(), b"One two");
    }

    #[test]
    fn content_after_end_needs_new_start() {
        let mut writer = TextWriter::new(Vec::new());
        writer.write(&Token::word("a")).expect("content");
        writer.write(&Token::end()).expect("end");
        assert!(writer.write(&Token::word("b")).is_err());
        writer.write(&Token::end()).expect("end is always accepted");
        writer.write(&Token::start()).expect("restart");
        writer.write(&Token::word("c")).expect("content");
        assert_eq!(writer.into_inner(), b"A\n\nC");
    }

    #[test]
    fn start_after_start_is_a_no_op() {
        let text = TextWriter::render(&[Token::start(), Token::start(), Token::word("x")])
            .expect("render");
        assert_eq!(text, "X");
    }

    #[test]
    fn capitalize_handles_multichar_uppercase() {
        assert_eq!(capitalize("ßa"), "SSa");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }
}
