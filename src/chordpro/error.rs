//! Error and warning types for the ChordPro front end.

use std::fmt;

use thiserror::Error;

/// An error raised while lexing, parsing, or walking a song tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{line}:{col}] {kind}: {message}")]
pub struct ChordProError {
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed escape sequence.
    Lexical,
    /// Token sequence violates the directive or chord grammar.
    Syntax,
    /// Dangling chorus reference, detected when a view walks the tree.
    Semantics,
    /// Tree invariant violated. Indicates a bug, not bad input.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lexical => "Lexical error",
            Self::Syntax => "Syntax error",
            Self::Semantics => "Semantics error",
            Self::Internal => "Internal error",
        };
        f.write_str(name)
    }
}

impl ChordProError {
    pub fn lexical(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
            kind: ErrorKind::Lexical,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
            kind: ErrorKind::Syntax,
        }
    }

    pub fn semantics(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
            kind: ErrorKind::Semantics,
        }
    }

    /// Internal errors carry no source position of their own.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            col: 0,
            kind: ErrorKind::Internal,
        }
    }
}

/// A recoverable condition reported while parsing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnknownDirective,
    DuplicateMetadata,
    UnterminatedChord,
    IgnoredSelector,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.line, self.col, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_and_kind() {
        let err = ChordProError::syntax("expected '}'", 3, 7);
        assert_eq!(err.to_string(), "[3:7] Syntax error: expected '}'");
    }

    #[test]
    fn internal_has_no_position() {
        let err = ChordProError::internal("broken tree");
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!((err.line, err.col), (0, 0));
    }
}
