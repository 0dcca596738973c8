//! Cursor over a token slice, shared by the parser's sub-grammars.

use super::error::ChordProError;
use super::token::{Token, TokenKind};

pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Kind of the token before the current one, if any.
    pub fn previous_kind(&self) -> Option<TokenKind> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.kind)
    }

    pub fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    /// Skip a run of space tokens, returning how many were skipped.
    pub fn skip_spaces(&mut self) -> usize {
        let mut count = 0;
        while self.check(TokenKind::Space) {
            self.pos += 1;
            count += 1;
        }
        count
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<&'a Token, ChordProError> {
        match self.peek() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(ChordProError::syntax(
                format!("unexpected {}, expecting {kind}", t.kind),
                t.line,
                t.col,
            )),
            None => {
                let (line, col) = self.end_position();
                Err(ChordProError::syntax(
                    format!("unexpected end of input, expecting {kind}"),
                    line,
                    col,
                ))
            }
        }
    }

    /// Position just past the last token, used to report end-of-input errors.
    pub fn end_position(&self) -> (usize, usize) {
        match self.tokens.last() {
            Some(t) if t.kind == TokenKind::Newline => (t.line + 1, 1),
            Some(t) => (t.line, t.col + t.text.chars().count()),
            None => (1, 1),
        }
    }
}
