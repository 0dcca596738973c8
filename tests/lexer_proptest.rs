//! Property-based tests for the lexer and the source round trip.

use proptest::prelude::*;
use songbook::chordpro::{self, RenderedSongbook, TokenKind};

/// Sections reduced to labels and (chord, lyric) pairs, ignoring node ids.
fn shape(view: &RenderedSongbook) -> Vec<(String, Vec<Vec<(Option<String>, String)>>)> {
    view.songs
        .iter()
        .flat_map(|song| song.sections.iter())
        .map(|section| {
            let lines = section
                .lines
                .iter()
                .map(|line| {
                    line.segments
                        .iter()
                        .map(|s| (s.chord.clone(), s.lyric.clone()))
                        .collect()
                })
                .collect();
            (section.label.clone(), lines)
        })
        .collect()
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (prop::option::of("[A-G][#b]?m?7?"), "[a-zA-Z',.!?]{1,8}"),
        1..6,
    )
    .prop_map(|segments| {
        segments
            .into_iter()
            .map(|(chord, word)| match chord {
                Some(chord) => format!("[{chord}]{word}"),
                None => word,
            })
            .collect::<Vec<_>>()
            .join(" ")
    })
}

fn stanza_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(line_strategy(), 1..4),
        prop::option::of(prop::option::of("[A-Z][a-z]{1,6}")),
    )
        .prop_map(|(lines, chorus)| {
            let body = lines.join("\n");
            match chorus {
                None => body,
                Some(None) => format!("{{soc}}\n{body}\n{{eoc}}"),
                Some(Some(name)) => format!("{{soc: {name}}}\n{body}\n{{eoc}}\n{{chorus: {name}}}"),
            }
        })
}

fn song_strategy() -> impl Strategy<Value = String> {
    ("[A-Za-z ]{0,12}", prop::collection::vec(stanza_strategy(), 0..5)).prop_map(
        |(title, stanzas)| format!("{{title: {title}}}\n{}\n", stanzas.join("\n\n")),
    )
}

proptest! {
    #[test]
    fn tokenize_is_total_without_escapes(input in "[^\\\\]{0,200}") {
        prop_assert!(chordpro::tokenize(&input).is_ok());
    }

    #[test]
    fn token_text_rebuilds_comment_free_input(input in "[^\\\\#\r]{0,200}") {
        let tokens = chordpro::tokenize(&input).unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.text.as_str()).collect();
        prop_assert_eq!(rebuilt, input);
    }

    #[test]
    fn newline_tokens_advance_lines(input in "[a-z \n{}\\[\\]]{0,100}") {
        let tokens = chordpro::tokenize(&input).unwrap();
        let newlines = tokens.iter().filter(|t| t.kind == TokenKind::Newline).count();
        prop_assert_eq!(newlines, input.matches('\n').count());
        for pair in tokens.windows(2) {
            prop_assert!((pair[0].line, pair[0].col) < (pair[1].line, pair[1].col));
        }
    }

    #[test]
    fn source_view_round_trips(input in song_strategy()) {
        let book = chordpro::parse(&input).unwrap();
        let source = book.to_source().unwrap();
        let again = chordpro::parse(&source).unwrap();
        prop_assert_eq!(shape(&book.render().unwrap()), shape(&again.render().unwrap()));
        prop_assert_eq!(again.to_source().unwrap(), source);
    }
}
