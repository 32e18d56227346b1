//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::token::Category;

/// Convenient result type used throughout the crate.
pub type Result<T, E = WeaveError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, IO, persistence, or
/// text rendering.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A persisted model failed structural validation while being read.
    #[error("corrupt model data: {0}")]
    Corrupt(String),
    /// A token was written to a detokenizer in a state that does not accept it.
    #[error("cannot write {attempted:?} after {state:?}")]
    Protocol {
        /// Category of the last token successfully written.
        state: Category,
        /// Category of the rejected token.
        attempted: Category,
    },
    /// A link was requested between tokens that are not nodes of the graph.
    #[error("token {0} is not part of the graph")]
    UnknownToken(String),
    /// Serialization or deserialization failure outside the binary graph layout.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WeaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl WeaveError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Returns `true` for errors raised because persisted data is malformed or truncated.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        match self {
            Self::Corrupt(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
