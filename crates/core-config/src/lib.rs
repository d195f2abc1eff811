//! Configuration loading.
//!
//! A `ttx.toml` discovered in the user configuration directory (or named
//! explicitly on the command line) customizes the prefix key, the status
//! bar, and the layout-save path. Unknown fields are tolerated so older
//! binaries can read newer files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use core_events::Key;

/// The parsed configuration file. Everything is optional; defaults apply.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub status_bar: Option<bool>,
    #[serde(default)]
    pub save_layout: Option<PathBuf>,
}

/// Effective configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: Key,
    pub show_status_bar: bool,
    pub save_layout_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: Key::B,
            show_status_bar: true,
            save_layout_path: None,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the discovered `ttx.toml`, or
    /// fall back to defaults when neither exists.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(path) => Some(path.to_owned()),
            None => default_config_path().filter(|path| path.exists()),
        };
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::info!(target: "config", path = %path.display(), "config loaded");
        Ok(Config::from_file(file))
    }

    fn from_file(file: ConfigFile) -> Config {
        let defaults = Config::default();
        let prefix = file
            .prefix
            .as_deref()
            .and_then(parse_key)
            .unwrap_or(defaults.prefix);
        Config {
            prefix,
            show_status_bar: file.status_bar.unwrap_or(defaults.show_status_bar),
            save_layout_path: file.save_layout,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ttx").join("ttx.toml"))
}

/// Parse a single-letter key name.
pub fn parse_key(name: &str) -> Option<Key> {
    let c = match name.chars().next() {
        Some(c) if name.chars().count() == 1 => c.to_ascii_lowercase(),
        _ => return None,
    };
    Some(match c {
        'a' => Key::A,
        'b' => Key::B,
        'c' => Key::C,
        'd' => Key::D,
        'e' => Key::E,
        'f' => Key::F,
        'g' => Key::G,
        'h' => Key::H,
        'i' => Key::I,
        'j' => Key::J,
        'k' => Key::K,
        'l' => Key::L,
        'm' => Key::M,
        'n' => Key::N,
        'o' => Key::O,
        'p' => Key::P,
        'q' => Key::Q,
        'r' => Key::R,
        's' => Key::S,
        't' => Key::T,
        'u' => Key::U,
        'v' => Key::V,
        'w' => Key::W,
        'x' => Key::X,
        'y' => Key::Y,
        'z' => Key::Z,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_when_no_file() {
        let config = Config::load(None).unwrap_or_else(|_| Config::default());
        // Whatever the machine's config dir holds, the call must not fail
        // when the file is absent.
        let _ = config;
        let defaults = Config::default();
        assert_eq!(defaults.prefix, Key::B);
        assert!(defaults.show_status_bar);
    }

    #[test]
    fn parses_fields_and_tolerates_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttx.toml");
        std::fs::write(
            &path,
            "prefix = \"a\"\nstatus_bar = false\nsave_layout = \"/tmp/l.json\"\nfuture_option = 3\n",
        )
        .unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.prefix, Key::A);
        assert!(!config.show_status_bar);
        assert_eq!(config.save_layout_path, Some(PathBuf::from("/tmp/l.json")));
    }

    #[test]
    fn bad_prefix_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttx.toml");
        std::fs::write(&path, "prefix = \"??\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.prefix, Key::B);
    }

    #[test]
    fn key_names() {
        assert_eq!(parse_key("b"), Some(Key::B));
        assert_eq!(parse_key("Q"), Some(Key::Q));
        assert_eq!(parse_key("space"), None);
        assert_eq!(parse_key(""), None);
    }
}
