//! Lexer for ChordPro source text.
//!
//! Converts source text into a flat stream of [`Token`]s. Every delimiter
//! character becomes its own token; everything else is gathered into words.
//! A `#` that is the first non-space character of a line starts a comment
//! running up to (not including) the newline.

use super::error::ChordProError;
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    /// Set once a non-space character has been seen on the current line.
    line_has_content: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            line_has_content: false,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ChordProError> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            let ch = self.peek();

            if ch == '\r' && self.peek_next() == Some('\n') {
                self.advance();
                continue;
            }

            if ch == '\n' {
                tokens.push(Token::new(TokenKind::Newline, "\n", self.line, self.col));
                self.advance();
                self.line += 1;
                self.col = 1;
                self.line_has_content = false;
                continue;
            }

            if ch == '#' && !self.line_has_content {
                self.skip_comment();
                continue;
            }

            if let Some(kind) = TokenKind::from_delimiter(ch) {
                if kind != TokenKind::Space {
                    self.line_has_content = true;
                }
                tokens.push(self.single_char(kind));
                continue;
            }

            self.line_has_content = true;
            tokens.push(self.lex_word()?);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        self.col += 1;
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let line = self.line;
        let col = self.col;
        let ch = self.advance();
        Token::new(kind, ch, line, col)
    }

    /// Greedily consume a word up to the next delimiter. A backslash takes the
    /// following character literally, delimiters included.
    fn lex_word(&mut self) -> Result<Token, ChordProError> {
        let line = self.line;
        let col = self.col;
        let mut s = String::new();

        while !self.is_at_end() {
            let ch = self.peek();
            if TokenKind::from_delimiter(ch).is_some() {
                break;
            }
            if ch == '\r' && self.peek_next() == Some('\n') {
                break;
            }
            if ch == '\\' {
                let (esc_line, esc_col) = (self.line, self.col);
                self.advance();
                if self.is_at_end() {
                    return Err(ChordProError::lexical(
                        "nothing to escape after '\\'",
                        esc_line,
                        esc_col,
                    ));
                }
                let escaped = self.advance();
                if escaped == '\n' {
                    self.line += 1;
                    self.col = 1;
                }
                s.push(escaped);
                continue;
            }
            s.push(self.advance());
        }

        Ok(Token::new(TokenKind::Word, s, line, col))
    }
}
