//! Song library: the song list, where song sources live, and assembling
//! several songs into one songbook.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chordpro::{self, BookMeta, ChordProError, ParseOptions, Songbook, Warning};

/// Extension of song files in a [`DirStore`].
pub const SONG_EXTENSION: &str = chordpro::SOURCE_EXTENSION;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid song list {path}: {message}")]
    InvalidList { path: PathBuf, message: String },

    #[error("song '{0}' not found")]
    NotFound(String),

    #[error("songbook '{0}' is not in the song list")]
    UnknownSongbook(String),

    #[error("song '{title}' by '{artist}' is not in the song list")]
    MissingSong { title: String, artist: String },

    #[error("{file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ChordProError,
    },
}

/// One song in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongEntry {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Store key of the song source, without extension.
    pub file: String,
}

impl SongEntry {
    /// `Title - Artist`, as shown in listings.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

/// Song id → entry, ordered by id, plus the named songbooks built from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongList {
    #[serde(default)]
    pub songs: BTreeMap<String, SongEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub songbooks: Vec<SongbookRef>,
}

/// A named songbook listed in the song list. `file` names the definition,
/// relative to the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongbookRef {
    pub file: String,
    #[serde(default)]
    pub title: String,
}

/// Songs of a named songbook, looked up in the list by title and artist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongbookDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub songs: Vec<SongRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRef {
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

impl SongbookDefinition {
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        read_document(path)
    }
}

/// Read a JSON document, or YAML for `.yaml`/`.yml` files.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, LibraryError> {
    let content = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if yaml {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| LibraryError::InvalidList {
        path: path.to_path_buf(),
        message,
    })
}

impl SongList {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Load a list from disk. `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON.
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let list: Self = read_document(path)?;
        debug!(
            "loaded {} songs and {} songbooks from {}",
            list.len(),
            list.songbooks.len(),
            path.display()
        );
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SongEntry> {
        self.songs.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SongEntry> {
        self.songs.values()
    }

    /// Entries whose title starts with `title_prefix` and whose artist
    /// contains `artist`, both compared case-insensitively. Empty filters
    /// match everything.
    pub fn search(&self, title_prefix: &str, artist: &str) -> Vec<&SongEntry> {
        let title_prefix = title_prefix.to_lowercase();
        let artist = artist.to_lowercase();
        self.entries()
            .filter(|e| e.title.to_lowercase().starts_with(&title_prefix))
            .filter(|e| e.artist.to_lowercase().contains(&artist))
            .collect()
    }

    /// First entry with exactly this title and artist.
    pub fn find(&self, title: &str, artist: &str) -> Option<&SongEntry> {
        self.entries()
            .find(|e| e.title == title && e.artist == artist)
    }

    pub fn songbook(&self, file: &str) -> Option<&SongbookRef> {
        self.songbooks.iter().find(|b| b.file == file)
    }

    /// Entries for the songs of a definition, in its order, and the songs
    /// missing from the list.
    pub fn resolve<'a>(
        &'a self,
        definition: &SongbookDefinition,
    ) -> (Vec<&'a SongEntry>, Vec<LibraryError>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for song in &definition.songs {
            match self.find(&song.title, &song.artist) {
                Some(entry) => found.push(entry),
                None => missing.push(LibraryError::MissingSong {
                    title: song.title.clone(),
                    artist: song.artist.clone(),
                }),
            }
        }
        (found, missing)
    }
}

/// Source text of songs by key. Where the text comes from (disk, cache,
/// network) is up to the implementation.
pub trait SongStore {
    fn fetch(&self, file: &str) -> Result<String, LibraryError>;
}

/// Songs stored as `<root>/<file>.chordpro`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(format!("{file}.{SONG_EXTENSION}"))
    }
}

impl SongStore for DirStore {
    fn fetch(&self, file: &str) -> Result<String, LibraryError> {
        let path = self.path_of(file);
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LibraryError::NotFound(file.to_string()),
            _ => LibraryError::Io { path, source },
        })
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    songs: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, source: impl Into<String>) {
        self.songs.insert(file.into(), source.into());
    }
}

impl SongStore for MemoryStore {
    fn fetch(&self, file: &str) -> Result<String, LibraryError> {
        self.songs
            .get(file)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(file.to_string()))
    }
}

/// A songbook assembled from a list, with what went wrong along the way.
#[derive(Debug)]
pub struct BuiltSongbook {
    pub book: Songbook,
    pub warnings: Vec<(String, Warning)>,
    pub failures: Vec<LibraryError>,
}

/// Parse every entry into one songbook, in order. Songs that cannot be
/// fetched or parsed are skipped and reported in `failures`.
pub fn build_songbook<'a>(
    entries: impl IntoIterator<Item = &'a SongEntry>,
    store: &dyn SongStore,
    meta: BookMeta,
    options: &ParseOptions,
) -> BuiltSongbook {
    let started = Instant::now();
    let mut book = Songbook::with_meta(meta);
    let mut warnings = Vec::new();
    let mut failures = Vec::new();

    for entry in entries {
        let source = match store.fetch(&entry.file) {
            Ok(source) => source,
            Err(err) => {
                warn!("skipping '{}': {err}", entry.title);
                failures.push(err);
                continue;
            }
        };
        match chordpro::parse_with_warnings(&source, &mut book, Some(&entry.file), options) {
            Ok(parsed) => warnings.extend(
                parsed
                    .warnings
                    .into_iter()
                    .map(|w| (entry.file.clone(), w)),
            ),
            Err(source) => {
                warn!("skipping '{}': {source}", entry.title);
                failures.push(LibraryError::Parse {
                    file: entry.file.clone(),
                    source,
                });
            }
        }
    }

    info!(
        "built songbook with {} songs in {:?} ({} skipped)",
        book.songs().len(),
        started.elapsed(),
        failures.len()
    );
    BuiltSongbook {
        book,
        warnings,
        failures,
    }
}

/// Build the songbook listed under `file`. Its definition is read from
/// `file` inside `list_dir`; songs it names that the list lacks are reported
/// in `failures` next to the ones that fail to parse.
pub fn build_named_songbook(
    list: &SongList,
    list_dir: &Path,
    file: &str,
    store: &dyn SongStore,
    options: &ParseOptions,
) -> Result<BuiltSongbook, LibraryError> {
    let listed = list
        .songbook(file)
        .ok_or_else(|| LibraryError::UnknownSongbook(file.to_string()))?;
    let definition = SongbookDefinition::load(&list_dir.join(&listed.file))?;
    let (entries, missing) = list.resolve(&definition);
    for err in &missing {
        warn!("{err}");
    }

    let meta = BookMeta {
        title: definition.title.clone(),
        subtitle: definition.subtitle.clone(),
        filename: Some(file.to_string()),
    };
    let mut built = build_songbook(entries, store, meta, options);
    let mut failures = missing;
    failures.append(&mut built.failures);
    built.failures = failures;
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIST_JSON: &str = r#"{
        "songs": {
            "1": {"title": "Yesterday", "artist": "The Beatles", "file": "yesterday"},
            "2": {"title": "Yellow Submarine", "artist": "The Beatles", "file": "yellow"},
            "3": {"title": "Wonderwall", "artist": "Oasis", "file": "wonderwall"}
        },
        "songbooks": [{"file": "beatles.json", "title": "Beatles"}]
    }"#;

    fn entry(title: &str, file: &str) -> SongEntry {
        SongEntry {
            title: title.to_string(),
            artist: String::new(),
            file: file.to_string(),
        }
    }

    fn camp() -> BookMeta {
        BookMeta {
            title: "Camp".to_string(),
            ..BookMeta::default()
        }
    }

    #[test]
    fn parse_json_list() {
        let list = SongList::from_json(LIST_JSON).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get("3").unwrap().file, "wonderwall");
        assert_eq!(list.songbook("beatles.json").unwrap().title, "Beatles");
        assert!(list.songbook("missing.json").is_none());
    }

    #[test]
    fn find_needs_exact_title_and_artist() {
        let list = SongList::from_json(LIST_JSON).unwrap();
        assert_eq!(list.find("Yesterday", "The Beatles").unwrap().file, "yesterday");
        assert!(list.find("yesterday", "The Beatles").is_none());
        assert!(list.find("Yesterday", "Oasis").is_none());
    }

    #[test]
    fn resolve_keeps_definition_order_and_reports_missing() {
        let list = SongList::from_json(LIST_JSON).unwrap();
        let definition: SongbookDefinition = serde_json::from_str(
            r#"{"title": "Mix", "songs": [
                {"title": "Wonderwall", "artist": "Oasis"},
                {"title": "Help", "artist": "The Beatles"},
                {"title": "Yesterday", "artist": "The Beatles"}
            ]}"#,
        )
        .unwrap();
        let (found, missing) = list.resolve(&definition);
        let files: Vec<_> = found.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["wonderwall", "yesterday"]);
        assert_eq!(missing.len(), 1);
        assert!(matches!(
            &missing[0],
            LibraryError::MissingSong { title, .. } if title == "Help"
        ));
    }

    #[test]
    fn named_songbook_from_definition_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("beatles.json"),
            r#"{"title": "Beatles", "subtitle": "Camp 2024", "songs": [
                {"title": "Yellow Submarine", "artist": "The Beatles"},
                {"title": "Let It Be", "artist": "The Beatles"},
                {"title": "Yesterday", "artist": "The Beatles"}
            ]}"#,
        )
        .unwrap();
        let list = SongList::from_json(LIST_JSON).unwrap();
        let mut store = MemoryStore::new();
        store.insert("yesterday", "{title: Yesterday}\nla");
        store.insert("yellow", "{title: Yellow Submarine}\nda");

        let built = build_named_songbook(
            &list,
            dir.path(),
            "beatles.json",
            &store,
            &ParseOptions::default(),
        )
        .unwrap();
        let meta = built.book.meta().unwrap();
        assert_eq!(meta.title, "Beatles");
        assert_eq!(meta.subtitle, "Camp 2024");
        assert_eq!(meta.filename.as_deref(), Some("beatles.json"));

        let titles: Vec<_> = built
            .book
            .songs()
            .iter()
            .map(|&s| built.book.song(s).unwrap().title.clone())
            .collect();
        assert_eq!(titles, vec!["Yellow Submarine", "Yesterday"]);
        assert_eq!(built.failures.len(), 1);
        assert!(matches!(built.failures[0], LibraryError::MissingSong { .. }));
    }

    #[test]
    fn unlisted_songbook_is_error() {
        let dir = TempDir::new().unwrap();
        let list = SongList::from_json(LIST_JSON).unwrap();
        let err = build_named_songbook(
            &list,
            dir.path(),
            "other.json",
            &MemoryStore::new(),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LibraryError::UnknownSongbook(name) if name == "other.json"));
    }

    #[test]
    fn parse_yaml_list_with_missing_artist() {
        let yaml = "songs:\n  a:\n    title: Hymn\n    file: hymn\n";
        let list = SongList::from_yaml(yaml).unwrap();
        assert_eq!(list.get("a").unwrap().artist, "");
    }

    #[test]
    fn search_title_prefix_case_insensitive() {
        let list = SongList::from_json(LIST_JSON).unwrap();
        let found: Vec<_> = list.search("ye", "").iter().map(|e| e.file.as_str()).collect();
        assert_eq!(found, vec!["yesterday", "yellow"]);
    }

    #[test]
    fn search_artist_substring() {
        let list = SongList::from_json(LIST_JSON).unwrap();
        let found = list.search("", "oasis");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name(), "Wonderwall - Oasis");
        assert!(list.search("yes", "oasis").is_empty());
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.yaml");
        std::fs::write(&path, "songs:\n  x:\n    title: X\n    artist: Y\n    file: x\n").unwrap();
        assert_eq!(SongList::load(&path).unwrap().len(), 1);

        let bad = dir.path().join("list.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            SongList::load(&bad),
            Err(LibraryError::InvalidList { .. })
        ));
    }

    #[test]
    fn dir_store_reads_chordpro_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.chordpro"), "{title: Song}").unwrap();
        let store = DirStore::new(dir.path());
        assert_eq!(store.fetch("song").unwrap(), "{title: Song}");
        assert!(matches!(
            store.fetch("missing"),
            Err(LibraryError::NotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn build_skips_failing_songs() {
        let mut store = MemoryStore::new();
        store.insert("good", "{title: Good}\n[C]la");
        store.insert("bad", "{title: Bad");
        let entries = vec![
            entry("Good", "good"),
            entry("Bad", "bad"),
            entry("Gone", "gone"),
        ];

        let built = build_songbook(&entries, &store, camp(), &ParseOptions::default());
        assert_eq!(built.book.songs().len(), 1);
        assert_eq!(built.book.meta().unwrap().title, "Camp");
        assert_eq!(built.failures.len(), 2);
        assert!(matches!(built.failures[0], LibraryError::Parse { .. }));
        assert!(matches!(built.failures[1], LibraryError::NotFound(_)));

        let song = built.book.songs()[0];
        assert_eq!(built.book.song(song).unwrap().filename.as_deref(), Some("good"));
    }

    #[test]
    fn build_collects_warnings_per_file() {
        let mut store = MemoryStore::new();
        store.insert("w", "{capo: 3}\nla");
        let entries = [entry("W", "w")];
        let built = build_songbook(&entries, &store, BookMeta::default(), &ParseOptions::default());
        assert_eq!(built.warnings.len(), 1);
        assert_eq!(built.warnings[0].0, "w");
    }
}
