//! Token types for the ChordPro lexer.

use std::fmt;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
    /// Source text of the token. For words this is the unescaped content.
    pub text: String,
}

/// The kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Delimiters
    OpenBrace,    // {
    CloseBrace,   // }
    Colon,        // :
    OpenBracket,  // [
    CloseBracket, // ]
    Asterisk,     // *
    Dash,         // -
    Quote,        // "
    Equals,       // =

    // Whitespace
    Space,
    Newline,

    // Content
    Word,
}

impl TokenKind {
    /// Map a delimiter character to its token kind. Words have no single
    /// character, so `None` means "starts or continues a word".
    pub fn from_delimiter(ch: char) -> Option<Self> {
        let kind = match ch {
            '{' => Self::OpenBrace,
            '}' => Self::CloseBrace,
            ':' => Self::Colon,
            '[' => Self::OpenBracket,
            ']' => Self::CloseBracket,
            '*' => Self::Asterisk,
            '-' => Self::Dash,
            '"' => Self::Quote,
            '=' => Self::Equals,
            ' ' => Self::Space,
            '\n' => Self::Newline,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Colon => "':'",
            Self::OpenBracket => "'['",
            Self::CloseBracket => "']'",
            Self::Asterisk => "'*'",
            Self::Dash => "'-'",
            Self::Quote => "'\"'",
            Self::Equals => "'='",
            Self::Space => "space",
            Self::Newline => "newline",
            Self::Word => "word",
        };
        f.write_str(name)
    }
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            line,
            col,
            text: text.into(),
        }
    }
}
