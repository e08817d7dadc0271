use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::fs_ops::FileOps;
use crate::tier::{Direction, TierLayout};

/// Decides which files actually need moving toward a tier.
///
/// A file resident in both tiers is a leftover of an interrupted move; the
/// cache copy is kept and the array copy deleted, whichever direction is
/// being filtered.
pub struct TierPlacementFilter {
    layout: TierLayout,
    ops: Arc<dyn FileOps>,
    dry_run: bool,
}

impl TierPlacementFilter {
    pub fn new(layout: TierLayout, ops: Arc<dyn FileOps>, dry_run: bool) -> Self {
        Self {
            layout,
            ops,
            dry_run,
        }
    }

    /// `files` are real paths. `desired` is the current desired-set (used to
    /// keep wanted files out of array moves); `skip` is dropped outright.
    pub fn filter(
        &self,
        files: &[PathBuf],
        direction: Direction,
        desired: &HashSet<PathBuf>,
        skip: &HashSet<PathBuf>,
    ) -> Vec<PathBuf> {
        let mut processed = HashSet::new();
        let mut keep = Vec::new();

        for file in files {
            if skip.contains(file) || !processed.insert(file) {
                continue;
            }

            let Some(cache_file) = self.layout.cache_path(file) else {
                warn!(
                    "{} is outside {}, skipping",
                    file.display(),
                    self.layout.real_root().display()
                );
                continue;
            };
            let array_file = self.layout.array_path(file);

            let wanted = match direction {
                Direction::Cache => self.needs_cache_move(&cache_file, &array_file),
                Direction::Array => {
                    !desired.contains(file) && self.needs_array_move(&cache_file, &array_file)
                }
            };

            if wanted {
                info!("Adding file to {}: {}", direction, file.display());
                keep.push(file.clone());
            }
        }

        keep
    }

    fn needs_cache_move(&self, cache_file: &Path, array_file: &Path) -> bool {
        if !self.ops.is_file(cache_file) {
            return true;
        }
        if self.ops.is_file(array_file) {
            self.remove_duplicate(array_file);
        }
        debug!("Already cached: {}", cache_file.display());
        false
    }

    fn needs_array_move(&self, cache_file: &Path, array_file: &Path) -> bool {
        if !self.ops.is_file(cache_file) {
            debug!("Not in cache, nothing to move: {}", cache_file.display());
            return false;
        }
        if self.ops.is_file(array_file) {
            self.remove_duplicate(array_file);
            return false;
        }
        true
    }

    fn remove_duplicate(&self, array_file: &Path) {
        if self.dry_run {
            info!("Dry run: would remove array copy {}", array_file.display());
            return;
        }
        match self.ops.remove_file(array_file) {
            Ok(()) => info!("Removed array version of file: {}", array_file.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!("Failed to remove array file {}: {}", array_file.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::LocalFileOps;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Tiers {
        _tmp: TempDir,
        real: PathBuf,
        cache: PathBuf,
        array: PathBuf,
    }

    impl Tiers {
        fn new() -> Self {
            let tmp = tempdir().unwrap();
            let real = tmp.path().join("user");
            let cache = tmp.path().join("cache");
            let array = tmp.path().join("user0");
            for d in [&real, &cache, &array] {
                fs::create_dir_all(d.join("Movies")).unwrap();
            }
            Self {
                _tmp: tmp,
                real,
                cache,
                array,
            }
        }

        fn filter(&self, dry_run: bool) -> TierPlacementFilter {
            let layout = TierLayout::new(&self.real, &self.cache, Some(self.array.clone()));
            TierPlacementFilter::new(layout, Arc::new(LocalFileOps::default()), dry_run)
        }
    }

    #[test]
    fn test_cache_direction_keeps_uncached_and_dedupes() {
        let t = Tiers::new();
        fs::write(t.array.join("Movies/a.mkv"), "a").unwrap();
        let file = t.real.join("Movies/a.mkv");

        let out = t.filter(false).filter(
            &[file.clone(), file.clone()],
            Direction::Cache,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert_eq!(out, vec![file]);
    }

    #[test]
    fn test_skip_set_dropped() {
        let t = Tiers::new();
        let file = t.real.join("Movies/a.mkv");
        let skip: HashSet<PathBuf> = [file.clone()].into_iter().collect();
        let out = t
            .filter(false)
            .filter(&[file], Direction::Cache, &HashSet::new(), &skip);
        assert!(out.is_empty());
    }

    #[test]
    fn test_array_direction_drops_desired_and_uncached() {
        let t = Tiers::new();
        fs::write(t.cache.join("Movies/wanted.mkv"), "w").unwrap();
        fs::write(t.cache.join("Movies/done.mkv"), "d").unwrap();
        let wanted = t.real.join("Movies/wanted.mkv");
        let done = t.real.join("Movies/done.mkv");
        let absent = t.real.join("Movies/absent.mkv");
        let desired: HashSet<PathBuf> = [wanted.clone()].into_iter().collect();

        let out = t.filter(false).filter(
            &[wanted, done.clone(), absent],
            Direction::Array,
            &desired,
            &HashSet::new(),
        );
        assert_eq!(out, vec![done]);
    }

    #[test]
    fn test_dry_run_keeps_duplicate() {
        let t = Tiers::new();
        fs::write(t.cache.join("Movies/a.mkv"), "c").unwrap();
        fs::write(t.array.join("Movies/a.mkv"), "a").unwrap();

        let out = t.filter(true).filter(
            &[t.real.join("Movies/a.mkv")],
            Direction::Cache,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert!(out.is_empty());
        assert!(t.array.join("Movies/a.mkv").exists());
    }
}
