//! Command-line interface for the `songbook` binary.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{debug, info};
use thiserror::Error;

use crate::chordpro::{self, BookMeta, ChordProError, Songbook};
use crate::config::{Config, ConfigError, OutputFormat};
use crate::library::{self, DirStore, LibraryError, SongList};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("{path}: {source}")]
    Song {
        path: PathBuf,
        #[source]
        source: ChordProError,
    },

    #[error(transparent)]
    ChordPro(#[from] ChordProError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// ChordPro songbook tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse one song and print it
    Render {
        file: PathBuf,
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Also save the ChordPro source into this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print the token stream of a song
    Tokens { file: PathBuf },
    /// Build a songbook from a song list
    Book {
        list: PathBuf,
        /// Named songbook from the list instead of every song
        #[arg(long)]
        songbook: Option<String>,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Also save the ChordPro source into this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Search a song list by title prefix and artist
    Search {
        list: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        artist: String,
    },
}

impl Args {
    /// Log level from the command line, else from the config.
    pub fn effective_log_level<'a>(&'a self, config: &'a Config) -> &'a str {
        self.log_level.as_deref().unwrap_or(&config.log_level)
    }
}

pub fn run(args: &Args, config: &Config, out: &mut dyn Write) -> Result<(), CliError> {
    debug!("running {:?}", args.command);
    match &args.command {
        Command::Render { file, format, save } => {
            let book = parse_file(file, config)?;
            let view = write_view(&book, format.unwrap_or(config.format))?;
            out.write_all(view.as_bytes())?;
            if let Some(dir) = save {
                save_source(&book, dir)?;
            }
        }
        Command::Tokens { file } => {
            let source = read(file)?;
            let tokens = chordpro::tokenize(&source).map_err(|source| CliError::Song {
                path: file.clone(),
                source,
            })?;
            for token in tokens {
                writeln!(out, "{}:{} {} {:?}", token.line, token.col, token.kind, token.text)?;
            }
        }
        Command::Book {
            list: list_path,
            songbook,
            title,
            subtitle,
            format,
            save,
        } => {
            let list = SongList::load(list_path)?;
            let store = DirStore::new(&config.songs_dir);
            let options = config.parse_options();
            let mut built = match songbook {
                Some(file) => {
                    let list_dir = list_path.parent().unwrap_or(Path::new("."));
                    library::build_named_songbook(&list, list_dir, file, &store, &options)?
                }
                None => {
                    let meta = BookMeta {
                        title: title.clone(),
                        subtitle: subtitle.clone(),
                        filename: None,
                    };
                    library::build_songbook(list.entries(), &store, meta, &options)
                }
            };
            if songbook.is_some() {
                let meta = built.book.meta_mut()?;
                if !title.is_empty() {
                    meta.title = title.clone();
                }
                if !subtitle.is_empty() {
                    meta.subtitle = subtitle.clone();
                }
            }
            let view = write_view(&built.book, format.unwrap_or(config.format))?;
            out.write_all(view.as_bytes())?;
            if let Some(dir) = save {
                save_source(&built.book, dir)?;
            }
        }
        Command::Search {
            list,
            title,
            artist,
        } => {
            let list = SongList::load(list)?;
            for entry in list.search(title, artist) {
                writeln!(out, "{}", entry.display_name())?;
            }
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| {
        CliError::Library(LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

fn parse_file(path: &Path, config: &Config) -> Result<Songbook, CliError> {
    let source = read(path)?;
    let name = path.file_stem().and_then(|s| s.to_str());
    let mut book = Songbook::new();
    let parsed =
        chordpro::parse_with_warnings(&source, &mut book, name, &config.parse_options())
            .map_err(|source| CliError::Song {
                path: path.to_path_buf(),
                source,
            })?;
    info!(
        "parsed {} ({} warnings)",
        path.display(),
        parsed.warnings.len()
    );
    Ok(book)
}

/// Write the source view to `dir`, named after the songbook.
fn save_source(book: &Songbook, dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(book.source_file_name()?);
    std::fs::write(&path, book.to_source()?).map_err(|source| {
        CliError::Library(LibraryError::Io {
            path: path.clone(),
            source,
        })
    })?;
    info!("saved {}", path.display());
    Ok(path)
}

fn write_view(book: &Songbook, format: OutputFormat) -> Result<String, CliError> {
    let view = match format {
        OutputFormat::Html => book.render()?.to_html(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&book.render()?)?;
            json.push('\n');
            json
        }
        OutputFormat::Source => book.to_source()?,
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_args(argv: &[&str], config: &Config) -> Result<String, CliError> {
        let args = Args::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        run(&args, config, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["songbook", "render", "a.chordpro", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.effective_log_level(&Config::default()), "debug");
    }

    #[test]
    fn log_level_falls_back_to_config() {
        let args = Args::try_parse_from(["songbook", "tokens", "a"]).unwrap();
        assert_eq!(args.effective_log_level(&Config::default()), "warn");
    }

    #[test]
    fn render_source_format() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "song.chordpro", "{t: Foo}\nHello [C]world\n");
        let out = run_args(
            &["songbook", "render", &file, "--format", "source"],
            &Config::default(),
        )
        .unwrap();
        assert_eq!(out, "{title: Foo}\n\nHello [C]world\n");
    }

    #[test]
    fn render_json_records_filename() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "yesterday.chordpro", "la");
        let out = run_args(&["songbook", "render", &file, "-f", "json"], &Config::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["songs"][0]["filename"], "yesterday");
    }

    #[test]
    fn render_reports_dangling_reference() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "song.chordpro", "{chorus: Nope}");
        let err = run_args(&["songbook", "render", &file], &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::ChordPro(_)));
    }

    #[test]
    fn render_syntax_error_names_file() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "broken.chordpro", "{title");
        let err = run_args(&["songbook", "render", &file], &Config::default()).unwrap_err();
        assert!(err.to_string().contains("broken.chordpro"));
    }

    #[test]
    fn tokens_lists_positions() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "song.chordpro", "[C]");
        let out = run_args(&["songbook", "tokens", &file], &Config::default()).unwrap();
        assert_eq!(out, "1:1 '[' \"[\"\n1:2 word \"C\"\n1:3 ']' \"]\"\n");
    }

    #[test]
    fn book_uses_songs_dir() {
        let dir = TempDir::new().unwrap();
        write(&dir, "one.chordpro", "{title: One}\nla");
        write(&dir, "two.chordpro", "{title: Two}\nda");
        let list = write(
            &dir,
            "list.json",
            r#"{"songs": {"a": {"title": "One", "artist": "X", "file": "one"},
                          "b": {"title": "Two", "artist": "Y", "file": "two"}}}"#,
        );
        let config = Config {
            songs_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let out = run_args(
            &["songbook", "book", &list, "--title", "Camp", "--format", "html"],
            &config,
        )
        .unwrap();
        assert!(out.contains("<h1>Camp</h1>"));
        assert!(out.contains("data-title=\"One\""));
        assert!(out.contains("data-title=\"Two\""));
    }

    #[test]
    fn search_prints_matches() {
        let dir = TempDir::new().unwrap();
        let list = write(
            &dir,
            "list.yaml",
            "songs:\n  a:\n    title: Yesterday\n    artist: Beatles\n    file: y\n  b:\n    title: Help\n    artist: Beatles\n    file: h\n",
        );
        let out = run_args(
            &["songbook", "search", &list, "--title", "yes"],
            &Config::default(),
        )
        .unwrap();
        assert_eq!(out, "Yesterday - Beatles\n");
    }

    #[test]
    fn book_builds_named_songbook() {
        let dir = TempDir::new().unwrap();
        write(&dir, "one.chordpro", "{title: One}\nla");
        write(&dir, "two.chordpro", "{title: Two}\nda");
        write(
            &dir,
            "duo.json",
            r#"{"title": "Duo", "subtitle": "Live", "songs": [
                {"title": "Two", "artist": "Y"},
                {"title": "Three", "artist": "Z"}
            ]}"#,
        );
        let list = write(
            &dir,
            "list.json",
            r#"{"songs": {"a": {"title": "One", "artist": "X", "file": "one"},
                          "b": {"title": "Two", "artist": "Y", "file": "two"}},
                "songbooks": [{"file": "duo.json", "title": "Duo"}]}"#,
        );
        let config = Config {
            songs_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let out = run_args(
            &["songbook", "book", &list, "--songbook", "duo.json", "-f", "json"],
            &config,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["title"], "Duo");
        assert_eq!(json["subtitle"], "Live");
        assert_eq!(json["filename"], "duo.json");
        assert_eq!(json["songs"].as_array().unwrap().len(), 1);
        assert_eq!(json["songs"][0]["title"], "Two");
    }

    #[test]
    fn book_rejects_unlisted_songbook() {
        let dir = TempDir::new().unwrap();
        let list = write(&dir, "list.json", r#"{"songs": {}}"#);
        let err = run_args(
            &["songbook", "book", &list, "--songbook", "nope.json"],
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Library(LibraryError::UnknownSongbook(_))));
    }

    #[test]
    fn render_saves_source_named_after_song() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "grace.chordpro", "{t: Grace}\n[G]Amazing");
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        run_args(
            &["songbook", "render", &file, "--save", out_dir.to_str().unwrap()],
            &Config::default(),
        )
        .unwrap();
        let saved = std::fs::read_to_string(out_dir.join("grace.chordpro")).unwrap();
        assert_eq!(saved, "{title: Grace}\n\n[G]Amazing\n");
    }
}
