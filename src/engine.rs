use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cleanup::CacheCleanup;
use crate::config::AppConfig;
use crate::error::Error;
use crate::filter::TierPlacementFilter;
use crate::fs_ops::{FileOps, LocalFileOps};
use crate::ledger::ExcludeLedger;
use crate::mover::{ConcurrentMover, MoveReport};
use crate::progress::ProgressReporter;
use crate::reconcile::EvictionReconciler;
use crate::snapshot::CacheSnapshotStore;
use crate::source::{Category, DesiredSource};
use crate::subtitles::SubtitleFinder;
use crate::tier::{Direction, TierLayout};
use crate::translate::PathTranslator;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log every planned action without touching the filesystem.
    pub dry_run: bool,
    /// Refetch watchlist/watched even when their snapshots are fresh.
    pub force_refresh: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub cache_moves: Option<MoveReport>,
    pub array_moves: Option<MoveReport>,
    pub cache_bytes: u64,
    pub array_bytes: u64,
    pub evicted: usize,
    pub ledger_pruned: usize,
    pub folders_cleaned: usize,
    /// Directions skipped because the batch could not be started.
    pub aborted: Vec<(Direction, String)>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.aborted.is_empty()
    }

    fn record(&mut self, direction: Direction, outcome: Result<Option<(MoveReport, u64)>, Error>) {
        let (report, bytes) = match outcome {
            Ok(Some(done)) => done,
            Ok(None) => return,
            Err(e) => {
                error!("Skipping moves to {}: {}", direction, e);
                self.aborted.push((direction, e.to_string()));
                return;
            }
        };
        match direction {
            Direction::Cache => {
                self.cache_moves = Some(report);
                self.cache_bytes = bytes;
            }
            Direction::Array => {
                self.array_moves = Some(report);
                self.array_bytes = bytes;
            }
        }
    }

    pub fn error_count(&self) -> usize {
        [&self.cache_moves, &self.array_moves]
            .into_iter()
            .flatten()
            .map(MoveReport::error_count)
            .sum()
    }
}

/// One tiering run: gather desired-sets, fill the cache, evict what is no
/// longer wanted, prune the ledger and sweep empty folders.
pub struct TieringEngine {
    config: AppConfig,
    ops: Arc<dyn FileOps>,
    options: RunOptions,
}

/// Per-run components, built once the configuration is known to be sane.
struct Pipeline {
    layout: TierLayout,
    translator: PathTranslator,
    subtitles: SubtitleFinder,
    ledger: Arc<ExcludeLedger>,
    filter: TierPlacementFilter,
    mover: ConcurrentMover,
    reconciler: EvictionReconciler,
    cleanup: CacheCleanup,
}

impl TieringEngine {
    pub fn new(config: AppConfig, options: RunOptions) -> Self {
        let ops = Arc::new(LocalFileOps::new(config.performance.permissions));
        Self {
            config,
            ops,
            options,
        }
    }

    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    fn pipeline(&self) -> Result<Pipeline, Error> {
        let layout = self.config.layout();
        let cleanup = CacheCleanup::new(
            layout.cache_root(),
            self.config.paths.library_folders.clone(),
            &self.config.paths.protected_paths,
        )?;
        let ledger = Arc::new(ExcludeLedger::new(self.config.ledger_path()));
        let dry_run = self.options.dry_run;

        Ok(Pipeline {
            translator: self.config.translator()?,
            subtitles: SubtitleFinder::default(),
            filter: TierPlacementFilter::new(layout.clone(), Arc::clone(&self.ops), dry_run),
            mover: ConcurrentMover::new(
                layout.clone(),
                Arc::clone(&self.ops),
                Arc::clone(&ledger),
                self.config.performance.max_concurrent_moves_array,
                self.config.performance.max_concurrent_moves_cache,
                dry_run,
            ),
            reconciler: EvictionReconciler::new(layout.clone(), Arc::clone(&self.ops)),
            ledger,
            cleanup,
            layout,
        })
    }

    pub fn run(
        &self,
        source: &dyn DesiredSource,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, Error> {
        let start = Instant::now();
        let pipeline = self.pipeline()?;
        let mut summary = RunSummary::default();

        if self.options.dry_run {
            warn!("Dry run is active, NO FILE WILL BE MOVED.");
        }

        reporter.on_phase("Checking active sessions");
        let skip: HashSet<PathBuf> = match source.active_files() {
            Ok(raw) => pipeline.translator.translate(&raw).into_iter().collect(),
            Err(e) => {
                warn!("Could not read active sessions: {}", e);
                HashSet::new()
            }
        };
        if !skip.is_empty() {
            if self.config.exit_if_active_session {
                return Err(Error::ActiveSession(skip.len()));
            }
            for file in &skip {
                warn!("Active session detected, skipping: {}", file.display());
            }
        }

        reporter.on_phase("Fetching desired media");
        let on_deck = self.fetch_on_deck(&pipeline, source, &skip);
        info!("Found {} OnDeck items", on_deck.len());

        let watchlist = if self.config.cache.watchlist_toggle {
            let store = CacheSnapshotStore::new(self.config.watchlist_snapshot_path());
            self.refresh_category(
                &pipeline,
                source,
                Category::Watchlist,
                &store,
                self.config.cache.watchlist_cache_expiry,
                &skip,
            )
        } else {
            info!("Watchlist processing is disabled");
            BTreeSet::new()
        };

        let watched = if self.config.cache.watched_move {
            let store = CacheSnapshotStore::new(self.config.watched_snapshot_path());
            self.refresh_category(
                &pipeline,
                source,
                Category::Watched,
                &store,
                self.config.cache.watched_cache_expiry,
                &skip,
            )
        } else {
            info!("Watched media processing is disabled");
            BTreeSet::new()
        };

        let mut to_cache: Vec<PathBuf> = on_deck;
        to_cache.extend(watchlist);
        let desired: HashSet<PathBuf> = to_cache.iter().cloned().collect();
        info!("Total media items to cache: {}", desired.len());

        reporter.on_phase("Moving files to cache");
        let outcome =
            self.move_batch(&pipeline, &to_cache, Direction::Cache, &desired, &skip, reporter);
        summary.record(Direction::Cache, outcome);

        reporter.on_phase("Reconciling cache ledger");
        let reconciliation = pipeline
            .reconciler
            .reconcile(&pipeline.ledger.read_all(), &desired);
        summary.evicted = reconciliation.move_back.len();

        let mut to_array: Vec<PathBuf> = watched.into_iter().collect();
        to_array.extend(reconciliation.move_back.iter().cloned());

        reporter.on_phase("Moving files to array");
        let outcome =
            self.move_batch(&pipeline, &to_array, Direction::Array, &desired, &skip, reporter);
        summary.record(Direction::Array, outcome);

        // Anything that left the cache this run loses its entry, whether it was
        // evicted or moved back as watched. Entries whose file is still in the
        // cache (skipped, failed, or kept as the surviving duplicate) stay
        // listed so a later run can evict them.
        let candidates: BTreeSet<PathBuf> = reconciliation
            .prune
            .into_iter()
            .chain(to_array.iter().filter_map(|f| pipeline.layout.cache_path(f)))
            .collect();
        let prune: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|entry| !self.ops.exists(entry))
            .collect();
        if self.options.dry_run {
            info!("Dry run: would prune {} ledger entries", prune.len());
        } else {
            match pipeline.ledger.remove_many(&prune) {
                Ok(removed) => summary.ledger_pruned = removed,
                Err(e) => error!("Error removing files from ledger: {}", e),
            }
        }

        reporter.on_phase("Cleaning up cache");
        summary.folders_cleaned = pipeline.cleanup.cleanup(self.options.dry_run);
        reporter.on_cleanup_complete(summary.folders_cleaned);

        summary.elapsed = start.elapsed();
        info!("Execution time: {}", format_duration(summary.elapsed));
        Ok(summary)
    }

    fn fetch_on_deck(
        &self,
        pipeline: &Pipeline,
        source: &dyn DesiredSource,
        skip: &HashSet<PathBuf>,
    ) -> Vec<PathBuf> {
        match source.fetch(Category::OnDeck) {
            Ok(raw) => {
                let translated = pipeline.translator.translate(&raw);
                pipeline.subtitles.with_subtitles(&translated, skip)
            }
            Err(e) => {
                warn!("Could not fetch on deck media: {}", e);
                Vec::new()
            }
        }
    }

    /// Reuse the category's snapshot while fresh; otherwise replace it
    /// wholesale with a new fetch. A failed fetch falls back to whatever the
    /// snapshot holds.
    fn refresh_category(
        &self,
        pipeline: &Pipeline,
        source: &dyn DesiredSource,
        category: Category,
        store: &CacheSnapshotStore,
        expiry_hours: i64,
        skip: &HashSet<PathBuf>,
    ) -> BTreeSet<PathBuf> {
        let snapshot = store.load();
        debug!(
            "{} snapshot: {} entries, last updated {:?}",
            category,
            snapshot.media.len(),
            snapshot.timestamp
        );

        let expired = store.is_expired(
            chrono::Duration::hours(expiry_hours),
            self.options.force_refresh,
            self.options.dry_run,
        );
        if !expired {
            info!("Loading {} media from snapshot...", category);
            return snapshot.media;
        }

        info!("Fetching {} media...", category);
        let raw = match source.fetch(category) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not fetch {} media ({}), reusing last snapshot", category, e);
                return snapshot.media;
            }
        };

        let translated = pipeline.translator.translate(&raw);
        let media: BTreeSet<PathBuf> = pipeline
            .subtitles
            .with_subtitles(&translated, skip)
            .into_iter()
            .collect();

        if !self.options.dry_run {
            if let Err(e) = store.save(&media, Utc::now()) {
                warn!("Could not save {} snapshot: {}", category, e);
            }
        }
        media
    }

    /// Filter, check free space, then move. `Ok(None)` when nothing needed
    /// moving; `Err` when the batch could not be started or run.
    fn move_batch(
        &self,
        pipeline: &Pipeline,
        files: &[PathBuf],
        direction: Direction,
        desired: &HashSet<PathBuf>,
        skip: &HashSet<PathBuf>,
        reporter: &dyn ProgressReporter,
    ) -> Result<Option<(MoveReport, u64)>, Error> {
        let filtered = pipeline.filter.filter(files, direction, desired, skip);
        if filtered.is_empty() {
            info!("No files to move to {}", direction);
            return Ok(None);
        }

        let bytes = match self.check_space(&pipeline.layout, &filtered, direction) {
            Ok(bytes) => bytes,
            Err(e) if self.options.dry_run => {
                error!("{}", e);
                0
            }
            Err(e) => return Err(e),
        };

        let report = pipeline.mover.move_files(&filtered, direction, reporter)?;
        Ok(Some((report, bytes)))
    }

    fn check_space(
        &self,
        layout: &TierLayout,
        files: &[PathBuf],
        direction: Direction,
    ) -> Result<u64, Error> {
        let sources: Vec<PathBuf> = files
            .iter()
            .filter_map(|f| match direction {
                Direction::Cache => Some(layout.array_path(f)),
                Direction::Array => layout.cache_path(f),
            })
            .collect();

        let needed = self.ops.total_size(&sources);
        if needed.bytes() == 0 {
            return Ok(0);
        }

        let free = self.ops.free_space(layout.destination_root(direction))?;
        info!("Moving {} to {} ({} free)", needed, direction, free);

        if needed.bytes() > free.bytes() {
            return Err(Error::InsufficientSpace {
                direction,
                needed: needed.bytes(),
                available: free.bytes(),
            });
        }
        Ok(needed.bytes())
    }
}

/// "1 day, 2 hours, 5 seconds" style rendering of an elapsed time.
pub fn format_duration(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let parts = [
        (total / 86_400, "day"),
        ((total % 86_400) / 3_600, "hour"),
        ((total % 3_600) / 60, "minute"),
        (total % 60, "second"),
    ];

    let rendered: Vec<String> = parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{} {}{}", n, unit, if *n > 1 { "s" } else { "" }))
        .collect();

    if rendered.is_empty() {
        "less than a second".to_string()
    } else {
        rendered.join(", ")
    }
}
