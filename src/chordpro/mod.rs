//! ChordPro front end: source text → tokens → song tree → render or source view.

pub mod ast;
pub mod cursor;
pub mod directives;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod source;
pub mod token;

pub use ast::{Block, BookMeta, Node, NodeId, NodeKind, NodeType, SongMeta, Songbook};
pub use error::{ChordProError, ErrorKind, Warning, WarningKind};
pub use parser::{ParseOptions, ParsedSong};
pub use render::{RenderedLine, RenderedSection, RenderedSong, RenderedSongbook, Segment};
pub use source::SOURCE_EXTENSION;
pub use token::{Token, TokenKind};

use lexer::Lexer;
use parser::Parser;

/// Split source text into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ChordProError> {
    Lexer::new(source).tokenize()
}

/// Parse one song into a fresh songbook.
pub fn parse(source: &str) -> Result<Songbook, ChordProError> {
    let mut book = Songbook::new();
    parse_into(source, &mut book, None)?;
    Ok(book)
}

/// Parse one song and append it to an existing songbook. On error the book is
/// left with the songs it had before the call.
pub fn parse_into(
    source: &str,
    book: &mut Songbook,
    filename: Option<&str>,
) -> Result<NodeId, ChordProError> {
    parse_with_warnings(source, book, filename, &ParseOptions::default()).map(|p| p.song)
}

/// Like [`parse_into`], also returning the recoverable problems found.
pub fn parse_with_warnings(
    source: &str,
    book: &mut Songbook,
    filename: Option<&str>,
    options: &ParseOptions,
) -> Result<ParsedSong, ChordProError> {
    let tokens = tokenize(source)?;
    Parser::new(&tokens, book, options).parse(filename)
}
