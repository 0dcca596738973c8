//! Render view: a presentation tree built from the song tree.
//!
//! Chorus references are expanded in place, chords are paired with the lyric
//! that follows them, and blocks carry their display labels. The result is
//! plain data (serializable with serde) plus a fixed HTML writer.

use serde::Serialize;

use super::ast::{NodeId, NodeKind, NodeType, Songbook};
use super::error::ChordProError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSongbook {
    pub title: String,
    pub subtitle: String,
    /// Name the songbook is published under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub songs: Vec<RenderedSong>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSong {
    pub id: NodeId,
    pub title: String,
    pub artist: String,
    pub heading: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub sections: Vec<RenderedSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    /// The verse or chorus node, or the reference that was expanded here.
    pub id: NodeId,
    pub kind: NodeType,
    pub label: String,
    /// Set when the section is a copy of an earlier chorus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded_from: Option<NodeId>,
    pub lines: Vec<RenderedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedLine {
    pub id: NodeId,
    pub segments: Vec<Segment>,
}

/// A chord and the lyric sung under it. Text before the first chord of a
/// line has no chord.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub chord: Option<String>,
    pub lyric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyric_id: Option<NodeId>,
}

impl Songbook {
    /// Build the presentation tree of every song. Fails on the first chorus
    /// reference that does not resolve.
    pub fn render(&self) -> Result<RenderedSongbook, ChordProError> {
        let meta = self.meta()?;
        let songs = self
            .songs()
            .iter()
            .map(|&song| self.render_song(song))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RenderedSongbook {
            title: meta.title.clone(),
            subtitle: meta.subtitle.clone(),
            filename: meta.filename.clone(),
            songs,
        })
    }

    pub fn render_song(&self, song: NodeId) -> Result<RenderedSong, ChordProError> {
        let meta = self
            .song(song)
            .ok_or_else(|| ChordProError::internal(format!("{song} is not a song")))?;

        let mut sections = Vec::new();
        for &child in self.children(song) {
            match self.kind(child) {
                Some(NodeKind::Verse(block)) | Some(NodeKind::Chorus(block)) => {
                    let kind = self.node(child)?.node_type();
                    sections.push(RenderedSection {
                        id: child,
                        kind,
                        label: block.label(kind),
                        expanded_from: None,
                        lines: self.render_lines(child)?,
                    });
                }
                Some(NodeKind::ChorusReference { .. }) => {
                    let chorus = self.resolve_reference(child)?;
                    let block = self.block(chorus).ok_or_else(|| {
                        ChordProError::internal(format!("{chorus} is not a chorus"))
                    })?;
                    sections.push(RenderedSection {
                        id: child,
                        kind: NodeType::Chorus,
                        label: block.label(NodeType::Chorus),
                        expanded_from: Some(chorus),
                        lines: self.render_lines(chorus)?,
                    });
                }
                other => {
                    return Err(ChordProError::internal(format!(
                        "unexpected {:?} under song {song}",
                        other.map(NodeKind::node_type)
                    )))
                }
            }
        }

        Ok(RenderedSong {
            id: song,
            title: meta.title.clone(),
            artist: meta.artist.clone(),
            heading: format!("{} - {}", meta.title, meta.artist),
            filename: meta.filename.clone(),
            sections,
        })
    }

    /// Lines of a block, with nested chorus references expanded inline.
    fn render_lines(&self, block: NodeId) -> Result<Vec<RenderedLine>, ChordProError> {
        let mut lines = Vec::new();
        for &child in self.children(block) {
            match self.kind(child) {
                Some(NodeKind::Line) => lines.push(self.render_line(child)?),
                Some(NodeKind::ChorusReference { .. }) => {
                    let chorus = self.resolve_reference(child)?;
                    lines.extend(self.render_lines(chorus)?);
                }
                other => {
                    return Err(ChordProError::internal(format!(
                        "unexpected {:?} under block {block}",
                        other.map(NodeKind::node_type)
                    )))
                }
            }
        }
        Ok(lines)
    }

    fn render_line(&self, line: NodeId) -> Result<RenderedLine, ChordProError> {
        let mut segments: Vec<Segment> = Vec::new();
        for &leaf in self.children(line) {
            match self.kind(leaf) {
                Some(NodeKind::Chord(chord)) => segments.push(Segment {
                    chord: Some(chord.clone()),
                    chord_id: Some(leaf),
                    ..Segment::default()
                }),
                Some(NodeKind::Text(text)) => match segments.last_mut() {
                    Some(open) if open.chord.is_some() && open.lyric_id.is_none() => {
                        open.lyric = text.clone();
                        open.lyric_id = Some(leaf);
                    }
                    _ => segments.push(Segment {
                        lyric: text.clone(),
                        lyric_id: Some(leaf),
                        ..Segment::default()
                    }),
                },
                other => {
                    return Err(ChordProError::internal(format!(
                        "unexpected {:?} under line {line}",
                        other.map(NodeKind::node_type)
                    )))
                }
            }
        }
        Ok(RenderedLine { id: line, segments })
    }
}

impl RenderedSongbook {
    /// Write the presentation tree as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"song-book\">\n");
        if !self.title.is_empty() || !self.subtitle.is_empty() {
            out.push_str(&format!(
                "<div class=\"titlepageholder\"><h2>{}</h2><h1>{}</h1></div>\n",
                escape(&self.subtitle),
                escape(&self.title)
            ));
        }
        for song in &self.songs {
            song.write_html(&mut out);
        }
        out.push_str("</div>\n");
        out
    }
}

impl RenderedSong {
    fn write_html(&self, out: &mut String) {
        out.push_str(&format!(
            "<div class=\"songholder\" data-title=\"{}\" data-artist=\"{}\">\n<h1>{}</h1>\n",
            escape(&self.title),
            escape(&self.artist),
            escape(&self.heading)
        ));
        for section in &self.sections {
            let class = match section.kind {
                NodeType::Chorus => "chorus",
                _ => "verse",
            };
            out.push_str(&format!(
                "<div class=\"{class}\"><span class=\"verseName\">{}</span><p class=\"{class}Content\">\n",
                escape(&section.label)
            ));
            for line in &section.lines {
                line.write_html(out);
            }
            out.push_str("</p></div>\n");
        }
        out.push_str("</div>\n");
    }
}

impl RenderedLine {
    fn write_html(&self, out: &mut String) {
        out.push_str("<div class=\"linewrapper\">");
        for segment in &self.segments {
            let lyric = format!("<span class=\"lyrics\">{}</span>", lyric_html(&segment.lyric));
            match &segment.chord {
                Some(chord) => out.push_str(&format!(
                    "<div class=\"chordLyricsWrapper\"><span class=\"chord\">{}</span>{lyric}</div>",
                    escape(chord)
                )),
                None => out.push_str(&lyric),
            }
        }
        out.push_str("</div>\n");
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escaped lyric with a leading or trailing space kept visible.
fn lyric_html(lyric: &str) -> String {
    if lyric.trim().is_empty() {
        return if lyric.is_empty() { String::new() } else { "&nbsp;".to_string() };
    }
    let lead = lyric.starts_with(' ');
    let trail = lyric.ends_with(' ');
    let core = &lyric[usize::from(lead)..lyric.len() - usize::from(trail)];
    let mut out = String::new();
    if lead {
        out.push_str("&nbsp;");
    }
    out.push_str(&escape(core));
    if trail {
        out.push_str("&nbsp;");
    }
    out
}
