//! Classified units of text flowing between the tokenizer, the graph, and the detokenizer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a [`Token`].
///
/// The declaration order is the persisted code (`START = 0` .. `END = 9`) and the primary
/// sort key of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Category {
    /// Start-of-line sentinel.
    Start = 0,
    /// Text word.
    Word,
    /// Content that could not be classified.
    Symbol,
    /// Opening delimiter found at the start of a raw word, such as `(`.
    LeftDelim,
    /// Closing delimiter found at the end of a raw word, such as `)` or `,`.
    RightDelim,
    /// Opening sentence mark, such as `¿`.
    LeftStop,
    /// Closing sentence mark, such as `.`.
    RightStop,
    /// Integer literal (`27`).
    Int,
    /// Decimal literal (`27.5`).
    Decimal,
    /// End-of-line sentinel.
    End,
}

impl Category {
    /// Every category in code order.
    pub const ALL: [Category; 10] = [
        Category::Start,
        Category::Word,
        Category::Symbol,
        Category::LeftDelim,
        Category::RightDelim,
        Category::LeftStop,
        Category::RightStop,
        Category::Int,
        Category::Decimal,
        Category::End,
    ];

    /// Persisted single-byte code.
    #[must_use]
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Inverse of [`Category::code`].
    #[must_use]
    pub fn from_code(code: i8) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// `true` for `Start` and `End`.
    #[must_use]
    pub fn is_sentinel(self) -> bool {
        matches!(self, Self::Start | Self::End)
    }

    /// `true` for words, symbols and numbers.
    #[must_use]
    pub fn is_content(self) -> bool {
        matches!(self, Self::Word | Self::Symbol | Self::Int | Self::Decimal)
    }

    /// `true` for both stop kinds.
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Self::LeftStop | Self::RightStop)
    }
}

/// Immutable `(category, text)` pair. Sentinels always carry empty text.
///
/// Equality, hashing and ordering compare the category first and the text second, so two
/// tokens built independently from the same parts are interchangeable map keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token {
    category: Category,
    text: String,
}

impl Token {
    /// Builds a token, discarding `text` for sentinel categories.
    pub fn new(category: Category, text: impl Into<String>) -> Self {
        let text = if category.is_sentinel() {
            String::new()
        } else {
            text.into()
        };
        Self { category, text }
    }

    /// Shorthand for a [`Category::Word`] token.
    pub fn word(text: impl Into<String>) -> Self {
        Self::new(Category::Word, text)
    }

    /// The start-of-line sentinel.
    #[must_use]
    pub fn start() -> Self {
        Self::new(Category::Start, "")
    }

    /// The end-of-line sentinel.
    #[must_use]
    pub fn end() -> Self {
        Self::new(Category::End, "")
    }

    /// Category of this token.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Text of this token; empty for sentinels.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `true` for the start and end sentinels.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.category.is_sentinel()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Category::Start => f.write_str("<START>"),
            Category::End => f.write_str("<END>"),
            _ => f.write_str(&self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn sentinels_drop_text() {
        let token = Token::new(Category::End, "ignored");
        assert_eq!(token.text(), "");
        assert_eq!(token, Token::end());
    }

    #[test]
    fn ordering_is_category_then_text() {
        let set: BTreeSet<Token> = [
            Token::end(),
            Token::word("b"),
            Token::new(Category::Int, "1"),
            Token::word("a"),
            Token::start(),
        ]
        .into_iter()
        .collect();
        let ordered: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(ordered, ["<START>", "a", "b", "1", "<END>"]);
    }

    #[test]
    fn codes_round_trip_and_reject_unknown() {
        for category in Category::ALL {
            assert_eq!(Category::from_code(category.code()), Some(category));
        }
        assert_eq!(Category::from_code(10), None);
        assert_eq!(Category::from_code(-1), None);
    }
}
