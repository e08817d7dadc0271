use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::source::ListFileSource;
use crate::tier::TierLayout;
use crate::translate::PathTranslator;

pub const WATCHLIST_SNAPSHOT_FILE: &str = "plexcache_watchlist_cache.json";
pub const WATCHED_SNAPSHOT_FILE: &str = "plexcache_watched_cache.json";
pub const LEDGER_FILE: &str = "plexcache_mover_files_to_exclude.txt";

/// Unraid's union of cache and array, and its array-only counterpart.
const UNION_ROOT: &str = "/mnt/user";
const UNION_ARRAY_ROOT: &str = "/mnt/user0";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exit_if_active_session: bool,
    pub paths: PathsConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Library root as the media server sees it.
    #[serde(default)]
    pub plex_source: Option<String>,
    /// Library root on this machine; every canonical path lives under it.
    pub real_source: String,
    pub cache_dir: String,
    /// Direct array root when `real_source` is a union of both tiers.
    /// Defaults to `/mnt/user0` when `real_source` is `/mnt/user`.
    #[serde(default)]
    pub array_dir: Option<String>,
    #[serde(default)]
    pub plex_library_folders: Vec<String>,
    #[serde(default)]
    pub nas_library_folders: Vec<String>,
    /// Cache subdirectories swept for empty folders; all when empty.
    #[serde(default)]
    pub library_folders: Vec<String>,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub protected_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_moves_array")]
    pub max_concurrent_moves_array: usize,
    #[serde(default = "default_moves_cache")]
    pub max_concurrent_moves_cache: usize,
    #[serde(default = "default_permissions")]
    pub permissions: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_moves_array: default_moves_array(),
            max_concurrent_moves_cache: default_moves_cache(),
            permissions: default_permissions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub watchlist_toggle: bool,
    /// Hours.
    #[serde(default = "default_expiry")]
    pub watchlist_cache_expiry: i64,
    /// Hours.
    #[serde(default = "default_expiry")]
    pub watched_cache_expiry: i64,
    #[serde(default = "default_true")]
    pub watched_move: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            watchlist_toggle: true,
            watchlist_cache_expiry: default_expiry(),
            watched_cache_expiry: default_expiry(),
            watched_move: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    pub on_deck_file: Option<PathBuf>,
    pub watchlist_file: Option<PathBuf>,
    pub watched_file: Option<PathBuf>,
    pub active_sessions_file: Option<PathBuf>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_moves_array() -> usize {
    2
}

fn default_moves_cache() -> usize {
    5
}

fn default_permissions() -> u32 {
    0o777
}

fn default_expiry() -> i64 {
    48
}

fn default_true() -> bool {
    true
}

/// Load `Config.toml` (or `path`) overlaid with `PLEXCACHE__SECTION__KEY`
/// environment variables, then validate.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, Error> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };

    let config: AppConfig = Config::builder()
        .add_source(file_source)
        .add_source(Environment::with_prefix("PLEXCACHE").separator("__"))
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let paths = &self.paths;
        if paths.real_source.trim().is_empty() {
            return Err(Error::InvalidConfig("paths.real_source is required".into()));
        }
        if paths.cache_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("paths.cache_dir is required".into()));
        }
        if Path::new(&paths.real_source) == Path::new(&paths.cache_dir) {
            return Err(Error::InvalidConfig(
                "paths.real_source and paths.cache_dir must differ".into(),
            ));
        }
        if paths.plex_library_folders.len() != paths.nas_library_folders.len() {
            return Err(Error::InvalidConfig(format!(
                "plex_library_folders has {} entries but nas_library_folders has {}",
                paths.plex_library_folders.len(),
                paths.nas_library_folders.len()
            )));
        }
        if self.performance.max_concurrent_moves_array == 0
            || self.performance.max_concurrent_moves_cache == 0
        {
            return Err(Error::InvalidConfig(
                "max_concurrent_moves_* must be at least 1".into(),
            ));
        }
        if let Some(array_dir) = &paths.array_dir {
            if Path::new(array_dir) == Path::new(&paths.real_source)
                || Path::new(array_dir) == Path::new(&paths.cache_dir)
            {
                return Err(Error::InvalidConfig(
                    "paths.array_dir must differ from real_source and cache_dir".into(),
                ));
            }
        }
        if self.cache.watchlist_cache_expiry < 0 || self.cache.watched_cache_expiry < 0 {
            return Err(Error::InvalidConfig("cache expiry cannot be negative".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> TierLayout {
        TierLayout::new(
            &self.paths.real_source,
            &self.paths.cache_dir,
            self.array_root(),
        )
    }

    /// Where array copies live. Under the union mount the real path would
    /// resolve to the cached copy too, so the array-only view is used.
    pub fn array_root(&self) -> Option<PathBuf> {
        match &self.paths.array_dir {
            Some(dir) => Some(PathBuf::from(dir)),
            None if Path::new(&self.paths.real_source) == Path::new(UNION_ROOT) => {
                Some(PathBuf::from(UNION_ARRAY_ROOT))
            }
            None => None,
        }
    }

    pub fn translator(&self) -> Result<PathTranslator, Error> {
        PathTranslator::new(
            self.paths.plex_source.as_deref(),
            &self.paths.real_source,
            &self.paths.plex_library_folders,
            &self.paths.nas_library_folders,
        )
    }

    pub fn list_source(&self) -> ListFileSource {
        ListFileSource {
            on_deck: self.sources.on_deck_file.clone(),
            watchlist: self.sources.watchlist_file.clone(),
            watched: self.sources.watched_file.clone(),
            active_sessions: self.sources.active_sessions_file.clone(),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.paths.state_dir.join(LEDGER_FILE)
    }

    pub fn watchlist_snapshot_path(&self) -> PathBuf {
        self.paths.state_dir.join(WATCHLIST_SNAPSHOT_FILE)
    }

    pub fn watched_snapshot_path(&self) -> PathBuf {
        self.paths.state_dir.join(WATCHED_SNAPSHOT_FILE)
    }
}
