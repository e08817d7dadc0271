use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::Error;

const PROTECTED_PATHS: &[&str] = &[
    "/",
    "/mnt",
    "/mnt/user",
    "/mnt/user0",
    "/home",
    "/var",
    "/etc",
    "/usr",
];

/// Removes directories left empty in the cache tier after files moved out.
#[derive(Debug)]
pub struct CacheCleanup {
    cache_root: PathBuf,
    library_folders: Vec<String>,
}

impl CacheCleanup {
    /// Fails before touching the filesystem when `cache_root` is empty or is
    /// a protected system directory (built-in list plus `extra_protected`).
    pub fn new(
        cache_root: &Path,
        library_folders: Vec<String>,
        extra_protected: &[PathBuf],
    ) -> Result<Self, Error> {
        if cache_root.as_os_str().is_empty() || cache_root.to_string_lossy().trim().is_empty() {
            return Err(Error::InvalidConfig("cache_dir cannot be empty".to_string()));
        }

        let normalized = normalize(cache_root);
        let mut candidates = vec![normalized.clone()];
        if let Ok(resolved) = fs::canonicalize(cache_root) {
            candidates.push(resolved);
        }

        let protected: Vec<PathBuf> = PROTECTED_PATHS
            .iter()
            .map(PathBuf::from)
            .chain(extra_protected.iter().map(|p| normalize(p)))
            .collect();

        if candidates.iter().any(|c| protected.contains(c)) {
            return Err(Error::ProtectedPath(cache_root.to_path_buf()));
        }

        Ok(Self {
            cache_root: normalized,
            library_folders,
        })
    }

    /// Sweep each library folder bottom-up. Returns the number of directories
    /// removed (or, in a dry run, found empty).
    pub fn cleanup(&self, dry_run: bool) -> usize {
        info!("Starting cache cleanup process...");

        let subdirs = if self.library_folders.is_empty() {
            self.top_level_dirs()
        } else {
            self.library_folders.clone()
        };

        let mut cleaned = 0;
        for subdir in subdirs {
            let subdir_path = self.cache_root.join(subdir.trim_matches('/'));
            if subdir_path.is_dir() {
                debug!("Cleaning up {}", subdir_path.display());
                cleaned += cleanup_directory(&subdir_path, dry_run);
            } else {
                debug!("Directory does not exist, skipping: {}", subdir_path.display());
            }
        }

        if cleaned > 0 {
            info!("Cleaned up {} empty folders", cleaned);
        } else {
            info!("No empty folders found to clean up");
        }
        cleaned
    }

    fn top_level_dirs(&self) -> Vec<String> {
        match fs::read_dir(&self.cache_root) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                error!(
                    "Could not list cache directory {}: {}",
                    self.cache_root.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Contents-first walk so a parent is examined after its children have
/// been removed. The root itself is kept.
fn cleanup_directory(dir: &Path, dry_run: bool) -> usize {
    let mut cleaned = 0;

    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error walking {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = match fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => {
                debug!("Could not read directory {}: {}", path.display(), e);
                continue;
            }
        };
        if !is_empty {
            continue;
        }

        if dry_run {
            info!("Dry run: would remove empty folder {}", path.display());
            cleaned += 1;
            continue;
        }
        match fs::remove_dir(path) {
            Ok(()) => {
                debug!("Removed empty folder: {}", path.display());
                cleaned += 1;
            }
            Err(e) => debug!("Could not remove directory {}: {}", path.display(), e),
        }
    }

    cleaned
}

/// Lexical normalization: drops `.` and trailing separators, resolves `..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
