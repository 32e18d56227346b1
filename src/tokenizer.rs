//! Pull-based tokenizer turning one line of raw bytes into a typed token stream.
//!
//! A line is split on Unicode whitespace into raw words. Each raw word is decomposed into
//! leading stops/delimiters, one content token, and trailing delimiters/stops. The split is
//! all-or-nothing: if anything is left over, or the content itself could not be classified,
//! the raw word becomes a single [`Category::Symbol`] token.

use std::collections::VecDeque;

use bstr::{ByteSlice, Fields};

use crate::bytes::Utf8Cursor;
use crate::config::Lexicon;
use crate::token::{Category, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// The START sentinel has not been produced yet.
    Start,
    /// Raw words are being read.
    Text,
    /// Input exhausted, the END sentinel is due.
    End,
    /// Terminal.
    Empty,
}

/// Token stream over a single line: `START`, the line's tokens, `END`, then nothing.
///
/// ```
/// use wordweave::{Category, Lexicon, TextReader};
///
/// let lexicon = Lexicon::default();
/// let categories: Vec<Category> = TextReader::new(b"Hi!", &lexicon)
///     .map(|token| token.category())
///     .collect();
/// assert_eq!(
///     categories,
///     [Category::Start, Category::Word, Category::RightStop, Category::End]
/// );
/// ```
#[derive(Debug)]
pub struct TextReader<'a> {
    lexicon: &'a Lexicon,
    fields: Fields<'a>,
    state: StreamState,
    pending: VecDeque<Token>,
}

impl<'a> TextReader<'a> {
    /// Creates a reader over one line of text.
    #[must_use]
    pub fn new(line: &'a [u8], lexicon: &'a Lexicon) -> Self {
        Self {
            lexicon,
            fields: line.fields(),
            state: StreamState::Start,
            pending: VecDeque::new(),
        }
    }

    /// Loads the next tokens if needed and reports whether [`TextReader::read`] will yield one.
    pub fn has_words(&mut self) -> bool {
        loop {
            if !self.pending.is_empty() {
                return true;
            }
            match self.state {
                StreamState::Start => {
                    self.pending.push_back(Token::start());
                    self.state = StreamState::Text;
                }
                StreamState::Text => match self.fields.next() {
                    Some(raw) => self.pending.extend(split_raw_word(raw, self.lexicon)),
                    None => self.state = StreamState::End,
                },
                StreamState::End => {
                    self.pending.push_back(Token::end());
                    self.state = StreamState::Empty;
                }
                StreamState::Empty => return false,
            }
        }
    }

    /// Takes the next loaded token. Call [`TextReader::has_words`] first.
    pub fn read(&mut self) -> Option<Token> {
        self.pending.pop_front()
    }
}

impl Iterator for TextReader<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.has_words() {
            self.read()
        } else {
            None
        }
    }
}

/// Tokenizes one line, sentinels included.
#[must_use]
pub fn tokenize_line(line: &[u8], lexicon: &Lexicon) -> Vec<Token> {
    TextReader::new(line, lexicon).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    Undecided,
    Word,
    Int,
    Decimal,
    /// Content that started out valid but met a character it cannot hold.
    Degraded,
}

impl Content {
    fn category(self) -> Option<Category> {
        match self {
            Content::Undecided => None,
            Content::Word => Some(Category::Word),
            Content::Int => Some(Category::Int),
            Content::Decimal => Some(Category::Decimal),
            Content::Degraded => Some(Category::Symbol),
        }
    }
}

/// Decomposes one whitespace-free raw word into tokens.
///
/// Never returns an empty vector for non-empty input.
#[must_use]
pub fn split_raw_word(raw: &[u8], lexicon: &Lexicon) -> Vec<Token> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut cursor = Utf8Cursor::new(raw);
    let mut tokens = Vec::new();

    while let Some(cp) = cursor.peek() {
        let category = if lexicon.is_left_stop(cp) {
            Category::LeftStop
        } else if lexicon.is_left_delim(cp) {
            Category::LeftDelim
        } else {
            break;
        };
        cursor.bump();
        tokens.push(Token::new(category, cp));
    }

    let mark = cursor.position();
    let content = if read_literal(&mut cursor, lexicon) {
        Content::Word
    } else {
        read_content(&mut cursor, lexicon)
    };
    if content == Content::Degraded {
        return vec![symbol(raw)];
    }
    if let Some(category) = content.category() {
        let text = String::from_utf8_lossy(cursor.since(mark)).into_owned();
        tokens.push(Token::new(category, text));
    }

    while let Some(cp) = cursor.peek() {
        let category = if lexicon.is_right_delim(cp) {
            Category::RightDelim
        } else if lexicon.is_right_stop(cp) {
            Category::RightStop
        } else {
            break;
        };
        cursor.bump();
        tokens.push(Token::new(category, cp));
    }

    if !cursor.is_at_end() {
        return vec![symbol(raw)];
    }
    tokens
}

fn symbol(raw: &[u8]) -> Token {
    Token::new(Category::Symbol, raw.to_str_lossy().into_owned())
}

fn is_suffix(lexicon: &Lexicon, cp: &str) -> bool {
    lexicon.is_right_delim(cp) || lexicon.is_right_stop(cp)
}

fn is_digit(cp: Option<&str>) -> bool {
    cp.and_then(|s| s.chars().next())
        .is_some_and(|ch| ch.is_ascii_digit())
}

fn is_letter(cp: Option<&str>) -> bool {
    cp.and_then(|s| s.chars().next())
        .is_some_and(char::is_alphabetic)
}

/// Consumes the longest literal at the cursor, provided only suffix characters follow it.
fn read_literal(cursor: &mut Utf8Cursor<'_>, lexicon: &Lexicon) -> bool {
    let mut best: Option<Utf8Cursor<'_>> = None;
    for literal in &lexicon.literals {
        let mut candidate = *cursor;
        if !candidate.eat_prefix(literal) {
            continue;
        }
        let mut tail = candidate;
        while tail.peek().is_some_and(|cp| is_suffix(lexicon, cp)) {
            tail.bump();
        }
        if !tail.is_at_end() {
            continue;
        }
        if best.map_or(true, |b| candidate.position() > b.position()) {
            best = Some(candidate);
        }
    }
    match best {
        Some(found) => {
            *cursor = found;
            true
        }
        None => false,
    }
}

/// Runs the content state machine, leaving the cursor on the first character that belongs
/// to the suffix (or on a malformed byte).
fn read_content(cursor: &mut Utf8Cursor<'_>, lexicon: &Lexicon) -> Content {
    let mut state = Content::Undecided;
    while let Some(cp) = cursor.peek() {
        let next = cursor.peek_second();
        let ch = cp.chars().next().unwrap_or_default();
        match state {
            Content::Undecided | Content::Word => {
                if ch.is_alphabetic() {
                    state = Content::Word;
                } else if lexicon.is_word_separator(cp) {
                    // A word never opens with a separator unless a letter follows it.
                    let dangling = state == Content::Undecided || is_suffix(lexicon, cp);
                    if dangling && !is_letter(next) {
                        break;
                    }
                    state = Content::Word;
                } else if state == Content::Undecided && ch.is_ascii_digit() {
                    state = Content::Int;
                } else if is_suffix(lexicon, cp) {
                    break;
                } else if state == Content::Undecided {
                    // Unknown leading character: the leftover check turns the word into a symbol.
                    break;
                } else {
                    return Content::Degraded;
                }
                cursor.bump();
            }
            Content::Int | Content::Decimal => {
                if ch.is_ascii_digit() {
                    cursor.bump();
                } else if lexicon.is_numeric_separator(cp) && is_digit(next) {
                    cursor.bump();
                    cursor.bump();
                    state = Content::Decimal;
                } else if is_suffix(lexicon, cp) {
                    break;
                } else {
                    // Letters after digits, or a separator with no digit behind it.
                    return Content::Degraded;
                }
            }
            Content::Degraded => break,
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(raw: &str) -> Vec<(Category, String)> {
        split_raw_word(raw.as_bytes(), &Lexicon::default())
            .into_iter()
            .map(|token| (token.category(), token.text().to_owned()))
            .collect()
    }

    fn pair(category: Category, text: &str) -> (Category, String) {
        (category, text.to_owned())
    }

    #[test]
    fn reader_produces_sentinels_around_line() {
        let lexicon = Lexicon::default();
        let tokens = tokenize_line(b"Hello, world!", &lexicon);
        assert_eq!(
            tokens,
            vec![
                Token::start(),
                Token::word("Hello"),
                Token::new(Category::RightDelim, ","),
                Token::word("world"),
                Token::new(Category::RightStop, "!"),
                Token::end(),
            ]
        );
    }

    #[test]
    fn reader_is_terminal_after_end() {
        let lexicon = Lexicon::default();
        let mut reader = TextReader::new(b"", &lexicon);
        assert!(reader.has_words());
        assert_eq!(reader.read(), Some(Token::start()));
        assert!(reader.has_words());
        assert_eq!(reader.read(), Some(Token::end()));
        assert!(!reader.has_words());
        assert!(!reader.has_words());
        assert_eq!(reader.read(), None);
    }

    #[test]
    fn decimal_is_a_single_token() {
        let lexicon = Lexicon::default();
        let tokens = tokenize_line(b"I have 3.5 apples", &lexicon);
        assert_eq!(tokens[3], Token::new(Category::Decimal, "3.5"));
        assert_eq!(tokens.len(), 6);
        assert_eq!(split("1,000,000"), vec![pair(Category::Decimal, "1,000,000")]);
    }

    #[test]
    fn trailing_separator_after_number_is_punctuation() {
        assert_eq!(
            split("42."),
            vec![pair(Category::Int, "42"), pair(Category::RightStop, ".")]
        );
        assert_eq!(
            split("3,"),
            vec![pair(Category::Int, "3"), pair(Category::RightDelim, ",")]
        );
    }

    #[test]
    fn incomplete_decimal_degrades_to_symbol() {
        assert_eq!(split("3'"), vec![pair(Category::Symbol, "3'")]);
        assert_eq!(split("3rd"), vec![pair(Category::Symbol, "3rd")]);
    }

    #[test]
    fn multibyte_stops_and_delimiters_are_split() {
        assert_eq!(
            split("¿Qué?"),
            vec![
                pair(Category::LeftStop, "¿"),
                pair(Category::Word, "Qué"),
                pair(Category::RightStop, "?"),
            ]
        );
        assert_eq!(
            split("(«niño»)."),
            vec![
                pair(Category::LeftDelim, "("),
                pair(Category::LeftDelim, "«"),
                pair(Category::Word, "niño"),
                pair(Category::RightDelim, "»"),
                pair(Category::RightDelim, ")"),
                pair(Category::RightStop, "."),
            ]
        );
    }

    #[test]
    fn word_separators_stay_inside_words() {
        assert_eq!(split("don't"), vec![pair(Category::Word, "don't")]);
        assert_eq!(
            split("well-known,"),
            vec![
                pair(Category::Word, "well-known"),
                pair(Category::RightDelim, ","),
            ]
        );
    }

    #[test]
    fn bare_separators_are_not_words() {
        assert_eq!(split("-"), vec![pair(Category::Symbol, "-")]);
        assert_eq!(split("--"), vec![pair(Category::Symbol, "--")]);
        assert_eq!(split("'"), vec![pair(Category::Symbol, "'")]);
        assert_eq!(split("'tis"), vec![pair(Category::Word, "'tis")]);
        assert_eq!(split("(-)"), vec![pair(Category::Symbol, "(-)")]);
    }

    #[test]
    fn decomposition_is_all_or_nothing() {
        assert_eq!(split("abc$"), vec![pair(Category::Symbol, "abc$")]);
        assert_eq!(split("x.y"), vec![pair(Category::Symbol, "x.y")]);
        assert_eq!(split("(#tag)"), vec![pair(Category::Symbol, "(#tag)")]);
        assert_eq!(split("a1"), vec![pair(Category::Symbol, "a1")]);
    }

    #[test]
    fn punctuation_only_words_split_into_marks() {
        assert_eq!(
            split("..."),
            vec![
                pair(Category::RightStop, "."),
                pair(Category::RightStop, "."),
                pair(Category::RightStop, "."),
            ]
        );
    }

    #[test]
    fn literals_survive_with_trailing_punctuation() {
        assert_eq!(
            split("etc.,"),
            vec![pair(Category::Word, "etc."), pair(Category::RightDelim, ",")]
        );
        assert_eq!(split("Dr."), vec![pair(Category::Word, "Dr.")]);
        assert_eq!(split("Dr.x"), vec![pair(Category::Symbol, "Dr.x")]);
    }

    #[test]
    fn custom_lexicon_changes_literals_and_separators() {
        let lexicon = Lexicon::builder()
            .literals(["St."])
            .word_separators(["'"])
            .build()
            .expect("valid lexicon");
        let tokens = tokenize_line(b"St. well-known", &lexicon);
        assert_eq!(tokens[1], Token::word("St."));
        assert_eq!(tokens[2], Token::new(Category::Symbol, "well-known"));
        assert_eq!(
            split_raw_word(b"Dr.", &lexicon),
            vec![Token::word("Dr"), Token::new(Category::RightStop, ".")]
        );
    }

    #[test]
    fn malformed_utf8_becomes_lossy_symbol() {
        let lexicon = Lexicon::default();
        let tokens = split_raw_word(&[b'o', b'k', 0xFF], &lexicon);
        assert_eq!(tokens, vec![Token::new(Category::Symbol, "ok\u{FFFD}")]);
    }
}
