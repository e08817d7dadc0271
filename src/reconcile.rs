use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fs_ops::FileOps;
use crate::tier::TierLayout;

lazy_static! {
    static ref SEASON_FOLDER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)^(season|series)\s*\d+$").unwrap(),
        Regex::new(r"^\d+$").unwrap(),
        Regex::new(r"(?i)^specials$").unwrap(),
    ];
}

fn is_season_folder(name: &str) -> bool {
    SEASON_FOLDER_PATTERNS.iter().any(|re| re.is_match(name))
}

/// The show directory of an episode: the ancestor immediately before the
/// first season-like component ("Season 3", "Series 2", "12", "Specials").
/// `None` for movies and anything else without such a component.
pub fn show_dir(path: &Path) -> Option<&Path> {
    let mut previous: Option<&Path> = None;

    for (i, component) in path.components().enumerate() {
        let name = component.as_os_str().to_str().unwrap_or_default();
        if is_season_folder(name) {
            return previous.filter(|p| p.file_name().is_some());
        }
        previous = Some(ancestor_with_components(path, i + 1));
    }
    None
}

fn ancestor_with_components(path: &Path, n: usize) -> &Path {
    let depth = path.components().count();
    path.ancestors().nth(depth - n).unwrap_or(path)
}

/// Result of comparing the ledger against the current desired-sets.
#[derive(Debug, Default, PartialEq)]
pub struct Reconciliation {
    /// Real paths of cached files that should go back to the array.
    pub move_back: Vec<PathBuf>,
    /// Ledger entries to drop: everything in `move_back` plus entries whose
    /// file no longer exists.
    pub prune: Vec<PathBuf>,
}

/// Finds cached files no longer backed by any desired-set, deciding per
/// show rather than per episode so partially watched seasons stay together.
pub struct EvictionReconciler {
    layout: TierLayout,
    ops: Arc<dyn FileOps>,
}

impl EvictionReconciler {
    pub fn new(layout: TierLayout, ops: Arc<dyn FileOps>) -> Self {
        Self { layout, ops }
    }

    /// Key used to compare shows across tiers: the show directory relative
    /// to the tier root holding it.
    pub fn show_group(&self, path: &Path) -> Option<PathBuf> {
        show_dir(path).map(|dir| self.layout.tier_relative(dir).to_path_buf())
    }

    pub fn reconcile(
        &self,
        ledger_entries: &[PathBuf],
        desired: &HashSet<PathBuf>,
    ) -> Reconciliation {
        let needed_shows: HashSet<PathBuf> =
            desired.iter().filter_map(|p| self.show_group(p)).collect();
        debug!("{} shows still needed", needed_shows.len());

        let mut seen = HashSet::new();
        let mut result = Reconciliation::default();

        for entry in ledger_entries {
            if !seen.insert(entry) {
                continue;
            }

            if !self.ops.exists(entry) {
                debug!("Cache file no longer exists: {}", entry.display());
                result.prune.push(entry.clone());
                continue;
            }

            let real = self
                .layout
                .real_path(entry)
                .unwrap_or_else(|| entry.clone());

            match self.show_group(entry) {
                Some(show) if needed_shows.contains(&show) => {
                    debug!("Show still needed, keeping in cache: {}", show.display());
                    continue;
                }
                Some(show) => {
                    info!(
                        "Show no longer needed, will move back to array: {} - {}",
                        show.display(),
                        entry.display()
                    );
                }
                None if desired.contains(&real) => {
                    debug!("Still desired, keeping in cache: {}", entry.display());
                    continue;
                }
                None => {
                    info!("No longer needed, will move back to array: {}", entry.display());
                }
            }

            result.move_back.push(real);
            result.prune.push(entry.clone());
        }

        info!("Found {} files to move back to array", result.move_back.len());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_dir_season_patterns() {
        for season in ["Season 3", "season03", "Series 2", "12", "Specials", "SPECIALS"] {
            let path = PathBuf::from(format!("/media/TV/Show A/{}/ep.mkv", season));
            assert_eq!(
                show_dir(&path),
                Some(Path::new("/media/TV/Show A")),
                "season folder {:?}",
                season
            );
        }
    }

    #[test]
    fn test_show_dir_none_for_movies() {
        assert_eq!(show_dir(Path::new("/media/Movies/Film (2020)/Film.mkv")), None);
        assert_eq!(show_dir(Path::new("/media/TV/Show/Seasonal/ep.mkv")), None);
    }

    #[test]
    fn test_show_dir_uses_first_season_component() {
        assert_eq!(
            show_dir(Path::new("/m/Show X {imdb-tt1}/Season 263/Extras/1/ep.mkv")),
            Some(Path::new("/m/Show X {imdb-tt1}"))
        );
    }

    #[test]
    fn test_show_dir_relative_path() {
        assert_eq!(show_dir(Path::new("Show/Season 1/e.mkv")), Some(Path::new("Show")));
        assert_eq!(show_dir(Path::new("Season 1/e.mkv")), None);
    }
}
