//! Songbook: ChordPro lexer, parser, song tree and its render and source views.

pub mod chordpro;
pub mod cli;
pub mod config;
pub mod library;
