use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;

/// The signal that put a path in a desired-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OnDeck,
    Watchlist,
    Watched,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::OnDeck => write!(f, "on deck"),
            Category::Watchlist => write!(f, "watchlist"),
            Category::Watched => write!(f, "watched"),
        }
    }
}

/// Upstream producer of desired paths, in the media server's namespace.
pub trait DesiredSource {
    fn fetch(&self, category: Category) -> Result<Vec<String>, Error>;

    /// Files currently being played; never moved during the run.
    fn active_files(&self) -> Result<Vec<String>, Error>;
}

/// Reads each category from a list file: either a JSON array of strings or
/// one path per line. Categories without a configured file are empty.
#[derive(Debug, Clone, Default)]
pub struct ListFileSource {
    pub on_deck: Option<PathBuf>,
    pub watchlist: Option<PathBuf>,
    pub watched: Option<PathBuf>,
    pub active_sessions: Option<PathBuf>,
}

impl ListFileSource {
    fn read(path: Option<&Path>) -> Result<Vec<String>, Error> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Source(format!("{}: {}", path.display(), e)))?;
        let entries = parse_list(&raw);
        debug!("Read {} entries from {}", entries.len(), path.display());
        Ok(entries)
    }
}

impl DesiredSource for ListFileSource {
    fn fetch(&self, category: Category) -> Result<Vec<String>, Error> {
        let path = match category {
            Category::OnDeck => &self.on_deck,
            Category::Watchlist => &self.watchlist,
            Category::Watched => &self.watched,
        };
        Self::read(path.as_deref())
    }

    fn active_files(&self) -> Result<Vec<String>, Error> {
        Self::read(self.active_sessions.as_deref())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    if raw.trim_start().starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            return list;
        }
    }
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}
