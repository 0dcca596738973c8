//! User configuration loaded from ~/.songbook/config.yaml.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chordpro::ParseOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing config file: {0}")]
    MissingFile(PathBuf),
}

/// Which view of a songbook to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Label of a chorus opened without a name.
    #[serde(default = "default_chorus_name")]
    pub default_chorus_name: String,
    /// Directory holding `<file>.chordpro` song sources.
    #[serde(default = "default_songs_dir")]
    pub songs_dir: PathBuf,
    /// Log level (off, error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_chorus_name() -> String {
    "R".to_string()
}

fn default_songs_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_chorus_name: default_chorus_name(),
            songs_dir: default_songs_dir(),
            log_level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

/// Default path for the config file.
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".songbook");
    path.push("config.yaml");
    path
}

impl Config {
    /// Load from an explicit path, which must exist, or from the default
    /// path, falling back to defaults when it is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) if !path.exists() => Err(ConfigError::MissingFile(path.to_path_buf())),
            Some(path) => Self::load_file(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load_file(&path)
                } else {
                    debug!("no config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // An empty file deserializes to null, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            default_chorus_name: self.default_chorus_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_chorus_name, "R");
        assert_eq!(config.songs_dir, PathBuf::from("."));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.format, OutputFormat::Html);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("format: json\nsongs_dir: /srv/songs\n").unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.songs_dir, PathBuf::from("/srv/songs"));
        assert_eq!(config.default_chorus_name, "R");
    }

    #[test]
    fn load_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "default_chorus_name: Ref\nlog_level: debug\n").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.parse_options().default_chorus_name, "Ref");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn empty_file_is_default() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(Config::load_file(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn malformed_file_is_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "format: [unclosed").unwrap();
        assert!(matches!(
            Config::load_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let path = Path::new("/tmp/songbook_test_missing_config.yaml");
        let _ = std::fs::remove_file(path);
        assert!(matches!(
            Config::load(Some(path)),
            Err(ConfigError::MissingFile(_))
        ));
    }

    #[test]
    fn serialize_round_trip() {
        let config = Config {
            format: OutputFormat::Source,
            ..Config::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
