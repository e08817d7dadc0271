use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which tier a batch of files is being moved toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Array,
    Cache,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Array => write!(f, "array"),
            Direction::Cache => write!(f, "cache"),
        }
    }
}

/// The roots of the two tiers and the prefix swaps between them.
///
/// `real_root` is the namespace every canonical path lives in. On systems
/// where that namespace is a union of both tiers (Unraid's `/mnt/user`),
/// `array_root` addresses the array disks directly (`/mnt/user0`); without
/// it the array copy of a file is its real path.
#[derive(Debug, Clone)]
pub struct TierLayout {
    real_root: PathBuf,
    cache_root: PathBuf,
    array_root: Option<PathBuf>,
}

impl TierLayout {
    pub fn new(
        real_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        array_root: Option<PathBuf>,
    ) -> Self {
        Self {
            real_root: real_root.into(),
            cache_root: cache_root.into(),
            array_root,
        }
    }

    pub fn real_root(&self) -> &Path {
        &self.real_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Root that receives files moved in `direction`; also the root whose free
    /// space is checked before a batch.
    pub fn destination_root(&self, direction: Direction) -> &Path {
        match direction {
            Direction::Cache => &self.cache_root,
            Direction::Array => self.array_root.as_deref().unwrap_or(&self.real_root),
        }
    }

    /// Cache-tier path of a real path, `None` when the path is outside the real root.
    pub fn cache_path(&self, real: &Path) -> Option<PathBuf> {
        real.strip_prefix(&self.real_root)
            .ok()
            .map(|rel| self.cache_root.join(rel))
    }

    /// Real path of a cache-tier path, `None` when the path is outside the cache root.
    pub fn real_path(&self, cached: &Path) -> Option<PathBuf> {
        cached
            .strip_prefix(&self.cache_root)
            .ok()
            .map(|rel| self.real_root.join(rel))
    }

    /// Direct array-tier path of a real path.
    pub fn array_path(&self, real: &Path) -> PathBuf {
        match (&self.array_root, real.strip_prefix(&self.real_root)) {
            (Some(array_root), Ok(rel)) => array_root.join(rel),
            _ => real.to_path_buf(),
        }
    }

    /// Path relative to whichever tier root contains it, or the path itself.
    pub fn tier_relative<'a>(&self, path: &'a Path) -> &'a Path {
        let roots = [Some(&self.cache_root), self.array_root.as_ref(), Some(&self.real_root)];
        roots
            .into_iter()
            .flatten()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
    }
}
