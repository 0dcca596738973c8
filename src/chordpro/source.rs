//! Source view: regenerate ChordPro text from the song tree.
//!
//! Generated verses are written as bare lines separated by blank lines, so
//! parsing the output rebuilds the same blocks. Chorus references are written
//! with the name of the chorus they resolve to.

use std::path::Path;

use super::ast::{Block, NodeId, NodeKind, Songbook};
use super::directives::{self, BlockKind, InlineMarker, MetaField};
use super::error::ChordProError;

/// Extension of ChordPro source files.
pub const SOURCE_EXTENSION: &str = "chordpro";

impl Songbook {
    /// ChordPro text of every song, separated by blank lines.
    pub fn to_source(&self) -> Result<String, ChordProError> {
        let songs = self
            .songs()
            .iter()
            .map(|&song| self.song_source(song))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs.join("\n"))
    }

    /// File name to save the source view under: the songbook's name without
    /// its extension, else the first song's file name, else `song`.
    pub fn source_file_name(&self) -> Result<String, ChordProError> {
        let book_stem = self.meta()?.filename.as_deref().map(|name| {
            Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name)
                .to_string()
        });
        let stem = book_stem
            .or_else(|| {
                let first = *self.songs().first()?;
                self.song(first)?.filename.clone()
            })
            .unwrap_or_else(|| "song".to_string());
        Ok(format!("{stem}.{SOURCE_EXTENSION}"))
    }

    pub fn song_source(&self, song: NodeId) -> Result<String, ChordProError> {
        let meta = self
            .song(song)
            .ok_or_else(|| ChordProError::internal(format!("{song} is not a song")))?;

        let mut header = String::new();
        for (field, value) in [(MetaField::Title, &meta.title), (MetaField::Artist, &meta.artist)] {
            if value.is_empty() {
                continue;
            }
            let name = directive_name(directives::metadata(field).map(|d| d.name))?;
            header.push_str(&format!("{{{name}: {}}}\n", escape_argument(value)));
        }

        let mut parts = Vec::new();
        if !header.is_empty() {
            parts.push(header);
        }
        for &child in self.children(song) {
            parts.push(self.item_source(child)?);
        }
        Ok(parts.join("\n"))
    }

    /// Source of one song-level item: a verse, a chorus, or a reference.
    fn item_source(&self, id: NodeId) -> Result<String, ChordProError> {
        match self.kind(id) {
            Some(NodeKind::Verse(block)) => self.block_source(id, BlockKind::Verse, block),
            Some(NodeKind::Chorus(block)) => self.block_source(id, BlockKind::Chorus, block),
            Some(NodeKind::ChorusReference { .. }) => self.reference_source(id),
            other => Err(ChordProError::internal(format!(
                "unexpected {:?} under a song",
                other.map(NodeKind::node_type)
            ))),
        }
    }

    fn block_source(
        &self,
        id: NodeId,
        kind: BlockKind,
        block: &Block,
    ) -> Result<String, ChordProError> {
        let mut body = String::new();
        for &child in self.children(id) {
            match self.kind(child) {
                Some(NodeKind::Line) => body.push_str(&self.line_source(child)?),
                Some(NodeKind::ChorusReference { .. }) => {
                    body.push_str(&self.reference_source(child)?)
                }
                other => {
                    return Err(ChordProError::internal(format!(
                        "unexpected {:?} under block {id}",
                        other.map(NodeKind::node_type)
                    )))
                }
            }
        }
        if block.generated {
            return Ok(body);
        }

        let (open, scope) = directives::scoped(kind).ok_or_else(|| {
            ChordProError::internal(format!("no directive opens a {:?}", kind.node_type()))
        })?;
        let mut out = if block.declared {
            format!("{{{}: {}}}\n", open.name, escape_argument(&block.name))
        } else {
            format!("{{{}}}\n", open.name)
        };
        out.push_str(&body);
        out.push_str(&format!("{{{}}}\n", scope.closing_name));
        Ok(out)
    }

    fn reference_source(&self, id: NodeId) -> Result<String, ChordProError> {
        let chorus = self.resolve_reference(id)?;
        let block = self
            .block(chorus)
            .ok_or_else(|| ChordProError::internal(format!("{chorus} is not a chorus")))?;
        let name = directive_name(
            directives::inline(InlineMarker::ChorusReference).map(|d| d.name),
        )?;
        Ok(format!("{{{name}: {}}}\n", escape_argument(&block.name)))
    }

    fn line_source(&self, line: NodeId) -> Result<String, ChordProError> {
        let mut out = String::new();
        for (i, &leaf) in self.children(line).iter().enumerate() {
            match self.kind(leaf) {
                Some(NodeKind::Text(text)) => out.push_str(&escape_text(text, i == 0)),
                Some(NodeKind::Chord(chord)) => {
                    out.push('[');
                    out.push_str(&escape_chord(chord));
                    out.push(']');
                }
                other => {
                    return Err(ChordProError::internal(format!(
                        "unexpected {:?} under line {line}",
                        other.map(NodeKind::node_type)
                    )))
                }
            }
        }
        out.push('\n');
        Ok(out)
    }
}

fn directive_name(name: Option<&'static str>) -> Result<&'static str, ChordProError> {
    name.ok_or_else(|| ChordProError::internal("directive missing from the registry"))
}

/// Escape lyric text. Leading spaces the parser would collapse are escaped;
/// the first one stays plain when the text follows a chord and more text
/// follows it, since a plain space before a newline is dropped.
fn escape_text(text: &str, first_in_line: bool) -> String {
    let blank = text.chars().all(|c| c == ' ');
    let mut out = String::with_capacity(text.len());
    let mut leading = true;
    for (i, ch) in text.chars().enumerate() {
        if leading && ch == ' ' {
            if first_in_line || blank || i > 0 {
                out.push('\\');
            }
            out.push(' ');
            continue;
        }
        leading = false;
        match ch {
            '\\' | '{' | '[' | '\n' | '\r' => out.push('\\'),
            '#' if first_in_line && i == 0 => out.push('\\'),
            _ => {}
        }
        out.push(ch);
    }
    out
}

fn escape_chord(chord: &str) -> String {
    let mut out = String::with_capacity(chord.len());
    let mut leading = true;
    for ch in chord.chars() {
        if ch != ' ' {
            leading = false;
        }
        if matches!(ch, '\\' | ']' | '\n' | '\r') || (leading && ch == ' ') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape a directive argument so it re-parses to the same string. Spaces
/// that argument parsing would trim or collapse are escaped.
fn escape_argument(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &ch) in chars.iter().enumerate() {
        let escape = match ch {
            '\\' | '{' | '}' | '[' | ']' | '"' | '=' | '\n' | '\r' => true,
            ' ' => i == 0 || i + 1 == chars.len() || chars[i - 1] == ' ',
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
