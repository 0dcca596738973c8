//! Parser for ChordPro.
//!
//! Walks the token stream once, keeping an insertion point (`active`) in the
//! song tree. Lyrics and chords outside any verse or chorus open a numbered
//! verse automatically; a blank line or any directive closes it again. Lines
//! are opened on the first content after a newline and closed by the newline.

use log::{debug, warn};

use super::ast::{Block, NodeId, NodeKind, NodeType, SongMeta, Songbook};
use super::cursor::TokenCursor;
use super::directives::{self, BlockKind, DirectiveClass, InlineMarker, MetaField};
use super::error::{ChordProError, Warning, WarningKind};
use super::token::{Token, TokenKind};

/// Parser settings that do not change between songs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Name given to a chorus opened without one.
    pub default_chorus_name: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_chorus_name: "R".to_string(),
        }
    }
}

/// Result of parsing one song into a songbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSong {
    pub song: NodeId,
    pub warnings: Vec<Warning>,
}

/// Argument of a directive: `{name: unnamed words key="value"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveArgument {
    pub text: String,
    pub named: Option<(String, String)>,
}

pub struct Parser<'t, 'b> {
    cursor: TokenCursor<'t>,
    book: &'b mut Songbook,
    options: &'b ParseOptions,
    song: NodeId,
    active: NodeId,
    /// The open verse was created by the parser, not by a directive.
    automatic: bool,
    /// No content seen since the last newline.
    at_line_start: bool,
    pending_spaces: usize,
    /// Start of the line following the most recent newline.
    line_start: (usize, usize),
    verse_counter: usize,
    warnings: Vec<Warning>,
}

impl<'t, 'b> Parser<'t, 'b> {
    pub fn new(tokens: &'t [Token], book: &'b mut Songbook, options: &'b ParseOptions) -> Self {
        let root = book.root();
        Self {
            cursor: TokenCursor::new(tokens),
            book,
            options,
            song: root,
            active: root,
            automatic: false,
            at_line_start: true,
            pending_spaces: 0,
            line_start: (1, 1),
            verse_counter: 0,
            warnings: Vec::new(),
        }
    }

    /// Parse the tokens as one new song appended to the songbook. On error
    /// the partial song is detached again, leaving the book's songs as they
    /// were.
    pub fn parse(mut self, filename: Option<&str>) -> Result<ParsedSong, ChordProError> {
        let meta = SongMeta {
            filename: filename.map(str::to_string),
            ..SongMeta::default()
        };
        self.song = self.book.create(NodeKind::Song(meta), 1, 1);
        self.book.attach(self.book.root(), self.song)?;
        self.active = self.song;

        match self.run() {
            Ok(()) => {
                debug!(
                    "parsed song {} with {} warning(s)",
                    self.song,
                    self.warnings.len()
                );
                Ok(ParsedSong {
                    song: self.song,
                    warnings: self.warnings,
                })
            }
            Err(err) => {
                if let Err(detach_err) = self.book.detach(self.song) {
                    debug!("could not detach failed song: {detach_err}");
                }
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<(), ChordProError> {
        while let Some(token) = self.cursor.peek() {
            if token.kind == TokenKind::Space {
                self.cursor.advance();
                self.pending_spaces += 1;
                continue;
            }
            let spaces = std::mem::take(&mut self.pending_spaces);
            match token.kind {
                TokenKind::OpenBrace => self.parse_directive()?,
                TokenKind::OpenBracket => self.parse_chord(spaces)?,
                TokenKind::Newline => self.parse_newline()?,
                _ => self.parse_text(spaces)?,
            }
        }
        self.close_to(self.song)
    }

    // --- directives -------------------------------------------------------

    fn parse_directive(&mut self) -> Result<(), ChordProError> {
        let open = self.cursor.expect(TokenKind::OpenBrace)?;
        let (line, col) = (open.line, open.col);
        self.at_line_start = false;
        self.close_line()?;
        if self.automatic {
            self.close_automatic()?;
        }

        self.cursor.skip_spaces();
        let name = self.cursor.expect(TokenKind::Word)?.text.clone();
        self.cursor.skip_spaces();

        if self.cursor.check(TokenKind::Dash) {
            self.cursor.advance();
            let selector = self.cursor.expect(TokenKind::Word)?;
            self.warn(
                WarningKind::IgnoredSelector,
                format!("selector '{}' on '{name}' is ignored", selector.text),
                selector.line,
                selector.col,
            );
            self.cursor.skip_spaces();
        }

        let mut argument = DirectiveArgument::default();
        if self.cursor.check(TokenKind::Colon) {
            self.cursor.advance();
            self.cursor.skip_spaces();
            argument = self.parse_argument()?;
        }
        self.cursor.skip_spaces();
        self.cursor.expect(TokenKind::CloseBrace)?;

        match directives::lookup(&name) {
            Some(directive) => match directive.class {
                DirectiveClass::Metadata(field) => {
                    self.set_metadata(field, directive.name, argument.text, line, col)
                }
                DirectiveClass::Scoped(scope) => {
                    self.open_block(scope.block, argument.text, line, col)
                }
                DirectiveClass::Inline(InlineMarker::ChorusReference) => {
                    self.append_reference(argument.text, line, col)
                }
            },
            None => self.close_by_name(&name, line, col),
        }
    }

    /// Space-separated words joined by single spaces, with an optional
    /// trailing `key=value` or `key="quoted value"` split off the last word.
    fn parse_argument(&mut self) -> Result<DirectiveArgument, ChordProError> {
        let mut parts: Vec<String> = Vec::new();
        loop {
            let mut value = String::new();
            while let Some(t) = self.cursor.peek() {
                if !matches!(
                    t.kind,
                    TokenKind::Word | TokenKind::Asterisk | TokenKind::Dash | TokenKind::Colon
                ) {
                    break;
                }
                value.push_str(&t.text);
                self.cursor.advance();
            }
            if !value.is_empty() {
                parts.push(value);
            }
            if self.cursor.skip_spaces() == 0 {
                break;
            }
        }

        let mut named = None;
        if self.cursor.check(TokenKind::Equals)
            && self.cursor.previous_kind() == Some(TokenKind::Word)
        {
            self.cursor.advance();
            let key = parts
                .pop()
                .ok_or_else(|| ChordProError::internal("named argument without a key"))?;
            let value = if self.cursor.check(TokenKind::Quote) {
                self.cursor.advance();
                let mut value = String::new();
                while let Some(t) = self.cursor.peek() {
                    if !matches!(
                        t.kind,
                        TokenKind::Word
                            | TokenKind::Space
                            | TokenKind::Asterisk
                            | TokenKind::Dash
                            | TokenKind::Colon
                            | TokenKind::Equals
                    ) {
                        break;
                    }
                    value.push_str(&t.text);
                    self.cursor.advance();
                }
                self.cursor.expect(TokenKind::Quote)?;
                value
            } else {
                self.cursor.expect(TokenKind::Word)?.text.clone()
            };
            named = Some((key, value));
        }

        Ok(DirectiveArgument {
            text: parts.join(" "),
            named,
        })
    }

    fn set_metadata(
        &mut self,
        field: MetaField,
        directive: &str,
        value: String,
        line: usize,
        col: usize,
    ) -> Result<(), ChordProError> {
        let song = self.song;
        let meta = self
            .book
            .song_mut(song)
            .ok_or_else(|| ChordProError::internal(format!("{song} is not a song")))?;
        let slot = match field {
            MetaField::Title => &mut meta.title,
            MetaField::Artist => &mut meta.artist,
        };
        let duplicate = !slot.is_empty();
        *slot = value;
        if duplicate {
            self.warn(
                WarningKind::DuplicateMetadata,
                format!("duplicate '{directive}' directive, keeping the last value"),
                line,
                col,
            );
        }
        Ok(())
    }

    fn open_block(
        &mut self,
        kind: BlockKind,
        name: String,
        line: usize,
        col: usize,
    ) -> Result<(), ChordProError> {
        // Blocks never nest: both verses and choruses start at song level.
        self.close_to(self.song)?;

        let node = match kind {
            BlockKind::Chorus if name.is_empty() => {
                NodeKind::Chorus(Block::default_chorus(&self.options.default_chorus_name))
            }
            BlockKind::Chorus => NodeKind::Chorus(Block::declared(name)),
            BlockKind::Verse if name.is_empty() => {
                self.verse_counter += 1;
                NodeKind::Verse(Block::ordinal(self.verse_counter, false))
            }
            BlockKind::Verse => NodeKind::Verse(Block::declared(name)),
        };
        let id = self.book.create(node, line, col);
        self.book.attach(self.song, id)?;
        if kind == BlockKind::Chorus {
            self.book.register_chorus(self.song, id)?;
        }
        self.active = id;
        self.automatic = false;
        Ok(())
    }

    fn append_reference(&mut self, name: String, line: usize, col: usize) -> Result<(), ChordProError> {
        let name = (!name.is_empty()).then_some(name);
        let id = self
            .book
            .create(NodeKind::ChorusReference { name }, line, col);
        self.book.attach(self.active, id)
    }

    /// Unknown directive names may close an open block; otherwise they are
    /// reported and ignored.
    fn close_by_name(&mut self, name: &str, line: usize, col: usize) -> Result<(), ChordProError> {
        let mut cursor = Some(self.active);
        while let Some(id) = cursor {
            let node_type = self.node_type(id)?;
            if let Some(kind) = BlockKind::from_node_type(node_type) {
                if let Some((_, scope)) = directives::scoped(kind) {
                    if scope.is_closed_by(name) {
                        let parent = self.book.parent(id).ok_or_else(|| {
                            ChordProError::internal(format!("broken tree: open {id} has no parent"))
                        })?;
                        self.close_to(parent)?;
                        self.automatic = false;
                        return Ok(());
                    }
                }
            }
            cursor = self.book.parent(id);
        }

        self.warn(
            WarningKind::UnknownDirective,
            format!("unknown directive '{name}'"),
            line,
            col,
        );
        Ok(())
    }

    // --- content ----------------------------------------------------------

    fn parse_chord(&mut self, spaces: usize) -> Result<(), ChordProError> {
        let open = self.cursor.expect(TokenKind::OpenBracket)?;
        let (line, col) = (open.line, open.col);
        self.at_line_start = false;
        self.ensure_block()?;
        let opened = self.ensure_line(line, col)?;
        if !opened && spaces > 0 {
            self.append_leaf(NodeKind::text(" "), line, col)?;
        }

        self.cursor.skip_spaces();
        let mut chord = String::new();
        loop {
            match self.cursor.peek() {
                Some(t) if t.kind == TokenKind::CloseBracket => {
                    self.cursor.advance();
                    break;
                }
                Some(t) if t.kind == TokenKind::Newline => {
                    self.warn_unterminated(line, col);
                    break;
                }
                Some(t) => {
                    chord.push_str(&t.text);
                    self.cursor.advance();
                }
                None => {
                    self.warn_unterminated(line, col);
                    break;
                }
            }
        }
        self.append_leaf(NodeKind::Chord(chord), line, col)
    }

    fn parse_text(&mut self, spaces: usize) -> Result<(), ChordProError> {
        let Some(first) = self.cursor.peek() else {
            return Ok(());
        };
        let (line, col) = (first.line, first.col);
        self.at_line_start = false;
        self.ensure_block()?;
        let opened = self.ensure_line(line, col)?;

        let mut value = String::new();
        if !opened && spaces > 0 {
            value.push(' ');
        }
        while let Some(t) = self.cursor.peek() {
            if matches!(
                t.kind,
                TokenKind::Newline | TokenKind::OpenBracket | TokenKind::OpenBrace
            ) {
                break;
            }
            value.push_str(&t.text);
            self.cursor.advance();
        }
        if value.is_empty() {
            return Ok(());
        }
        self.append_leaf(NodeKind::Text(value), line, col)
    }

    fn parse_newline(&mut self) -> Result<(), ChordProError> {
        let newline = self.cursor.expect(TokenKind::Newline)?;
        self.line_start = (newline.line + 1, 1);
        self.close_line()?;
        if self.at_line_start && self.automatic {
            self.close_automatic()?;
        }
        self.at_line_start = true;
        Ok(())
    }

    // --- insertion point --------------------------------------------------

    /// Open a numbered verse unless the insertion point is already inside a
    /// verse or chorus.
    fn ensure_block(&mut self) -> Result<(), ChordProError> {
        let inside = self.book.ancestor_of(self.active, NodeType::Verse).is_some()
            || self.book.ancestor_of(self.active, NodeType::Chorus).is_some();
        if inside {
            return Ok(());
        }
        self.verse_counter += 1;
        let (line, col) = self.line_start;
        let id = self.book.create(
            NodeKind::Verse(Block::ordinal(self.verse_counter, true)),
            line,
            col,
        );
        self.book.attach(self.active, id)?;
        self.active = id;
        self.automatic = true;
        Ok(())
    }

    /// Open a line unless one is already open. Returns whether one was opened.
    fn ensure_line(&mut self, line: usize, col: usize) -> Result<bool, ChordProError> {
        if self.node_type(self.active)? == NodeType::Line {
            return Ok(false);
        }
        let id = self.book.create(NodeKind::Line, line, col);
        self.book.attach(self.active, id)?;
        self.active = id;
        Ok(true)
    }

    fn append_leaf(&mut self, kind: NodeKind, line: usize, col: usize) -> Result<(), ChordProError> {
        let id = self.book.create(kind, line, col);
        self.book.attach(self.active, id)
    }

    fn close_line(&mut self) -> Result<(), ChordProError> {
        match self.book.ancestor_of(self.active, NodeType::Line) {
            Some(line) => {
                let parent = self.book.parent(line).ok_or_else(|| {
                    ChordProError::internal(format!("broken tree: {line} has no parent"))
                })?;
                self.close_to(parent)
            }
            None => Ok(()),
        }
    }

    fn close_automatic(&mut self) -> Result<(), ChordProError> {
        self.automatic = false;
        let mut cursor = Some(self.active);
        while let Some(id) = cursor {
            if self.book.block(id).is_some_and(|b| b.generated) {
                let parent = self.book.parent(id).ok_or_else(|| {
                    ChordProError::internal(format!("broken tree: {id} has no parent"))
                })?;
                return self.close_to(parent);
            }
            cursor = self.book.parent(id);
        }
        Ok(())
    }

    /// Move the insertion point up to `target`, pruning containers left empty
    /// on the way.
    fn close_to(&mut self, target: NodeId) -> Result<(), ChordProError> {
        let mut chain = Vec::new();
        let mut current = self.active;
        while current != target {
            chain.push(current);
            current = self.book.parent(current).ok_or_else(|| {
                ChordProError::internal(format!(
                    "broken tree: {target} is not an ancestor of {}",
                    self.active
                ))
            })?;
        }
        for id in chain {
            self.prune_if_empty(id)?;
        }
        self.active = target;
        Ok(())
    }

    fn prune_if_empty(&mut self, id: NodeId) -> Result<(), ChordProError> {
        let node = self.book.node(id)?;
        let prunable = matches!(
            node.node_type(),
            NodeType::Line | NodeType::Verse | NodeType::Chorus
        );
        if !prunable || !node.children().is_empty() {
            return Ok(());
        }
        let released_ordinal = node.node_type() == NodeType::Verse
            && self
                .book
                .block(id)
                .is_some_and(|b| !b.declared && b.name == self.verse_counter.to_string());
        debug!("pruning empty {:?} {id}", node.node_type());
        self.book.remove(id)?;
        if released_ordinal {
            self.verse_counter -= 1;
        }
        Ok(())
    }

    // --- helpers ----------------------------------------------------------

    fn node_type(&self, id: NodeId) -> Result<NodeType, ChordProError> {
        Ok(self.book.node(id)?.node_type())
    }

    fn warn(&mut self, kind: WarningKind, message: String, line: usize, col: usize) {
        warn!("{message} on line {line} char {col}");
        self.warnings.push(Warning {
            message,
            line,
            col,
            kind,
        });
    }

    fn warn_unterminated(&mut self, line: usize, col: usize) {
        self.warn(
            WarningKind::UnterminatedChord,
            "chord bracket not closed before end of line".to_string(),
            line,
            col,
        );
    }
}
