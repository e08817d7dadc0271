use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::fs_ops::FileOps;
use crate::ledger::ExcludeLedger;
use crate::progress::ProgressReporter;
use crate::tier::{Direction, TierLayout};

/// One planned relocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub src: PathBuf,
    pub dest_dir: PathBuf,
    pub direction: Direction,
}

#[derive(Debug)]
pub struct MoveReport {
    pub direction: Direction,
    pub planned: usize,
    /// Destination paths of successful moves.
    pub moved: Vec<PathBuf>,
    /// Source path and error message of each failed move.
    pub failed: Vec<(PathBuf, String)>,
    pub dry_run: bool,
}

impl MoveReport {
    fn empty(direction: Direction, dry_run: bool) -> Self {
        Self {
            direction,
            planned: 0,
            moved: Vec::new(),
            failed: Vec::new(),
            dry_run,
        }
    }

    pub fn error_count(&self) -> usize {
        self.failed.len()
    }
}

/// Executes moves on a bounded worker pool, one pool size per direction.
///
/// Successful cache-direction moves are appended to the ledger; the ledger
/// serializes its own writes so moves themselves stay parallel.
pub struct ConcurrentMover {
    layout: TierLayout,
    ops: Arc<dyn FileOps>,
    ledger: Arc<ExcludeLedger>,
    concurrency_array: usize,
    concurrency_cache: usize,
    dry_run: bool,
}

impl ConcurrentMover {
    pub fn new(
        layout: TierLayout,
        ops: Arc<dyn FileOps>,
        ledger: Arc<ExcludeLedger>,
        concurrency_array: usize,
        concurrency_cache: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            layout,
            ops,
            ledger,
            concurrency_array: concurrency_array.max(1),
            concurrency_cache: concurrency_cache.max(1),
            dry_run,
        }
    }

    /// Build move commands for the real paths in `files`. Files already on
    /// the destination side produce no command, so re-running is a no-op.
    pub fn plan(&self, files: &[PathBuf], direction: Direction) -> Vec<MoveCommand> {
        let mut processed = HashSet::new();
        let mut commands = Vec::new();

        for file in files {
            if !processed.insert(file) {
                continue;
            }
            let Some(cache_file) = self.layout.cache_path(file) else {
                warn!("{} is outside the real root, not moving", file.display());
                continue;
            };

            let command = match direction {
                Direction::Cache if !self.ops.is_file(&cache_file) => {
                    parent_of(&cache_file).map(|dest_dir| MoveCommand {
                        src: self.layout.array_path(file),
                        dest_dir,
                        direction,
                    })
                }
                Direction::Array if self.ops.is_file(&cache_file) => {
                    parent_of(&self.layout.array_path(file)).map(|dest_dir| MoveCommand {
                        src: cache_file.clone(),
                        dest_dir,
                        direction,
                    })
                }
                _ => None,
            };

            match command {
                Some(command) => {
                    debug!("Added move command for: {}", file.display());
                    commands.push(command);
                }
                None => debug!("No move command generated for: {}", file.display()),
            }
        }

        info!("Generated {} move commands for {}", commands.len(), direction);
        commands
    }

    pub fn move_files(
        &self,
        files: &[PathBuf],
        direction: Direction,
        reporter: &dyn ProgressReporter,
    ) -> Result<MoveReport, Error> {
        info!("Moving media files to {}...", direction);
        let commands = self.plan(files, direction);
        self.execute(&commands, direction, reporter)
    }

    pub fn execute(
        &self,
        commands: &[MoveCommand],
        direction: Direction,
        reporter: &dyn ProgressReporter,
    ) -> Result<MoveReport, Error> {
        let mut report = MoveReport::empty(direction, self.dry_run);
        report.planned = commands.len();
        if commands.is_empty() {
            return Ok(report);
        }

        if self.dry_run {
            for command in commands {
                info!(
                    "Dry run: would move {} -> {}",
                    command.src.display(),
                    command.dest_dir.display()
                );
            }
            return Ok(report);
        }

        let workers = match direction {
            Direction::Array => self.concurrency_array,
            Direction::Cache => self.concurrency_cache,
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("mover-{}-{}", direction, i))
            .build()
            .map_err(|e| Error::Other(format!("Could not build mover pool: {}", e)))?;

        let start = Instant::now();
        let total = commands.len();
        let done = AtomicUsize::new(0);
        let failures: DashMap<PathBuf, String> = DashMap::new();
        reporter.on_move_start(direction, total);

        let moved: Vec<PathBuf> = pool.install(|| {
            commands
                .par_iter()
                .filter_map(|command| {
                    let result = self.move_one(command);
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.on_move_progress(direction, finished, total);
                    match result {
                        Ok(dest) => Some(dest),
                        Err(e) => {
                            error!("Error moving file {}: {}", command.src.display(), e);
                            failures.insert(command.src.clone(), e.to_string());
                            None
                        }
                    }
                })
                .collect()
        });

        report.moved = moved;
        report.failed = failures.into_iter().collect();
        report.failed.sort();

        reporter.on_move_complete(
            direction,
            report.moved.len(),
            report.failed.len(),
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Finished moving files to {} with {} errors.",
            direction,
            report.error_count()
        );
        Ok(report)
    }

    fn move_one(&self, command: &MoveCommand) -> Result<PathBuf, Error> {
        self.ops
            .create_dir_with_permissions(&command.dest_dir, &command.src)?;
        let dest = self.ops.move_file(&command.src, &command.dest_dir)?;
        info!(
            "Moved file from {} to {} with original permissions and owner.",
            command.src.display(),
            command.dest_dir.display()
        );

        if command.direction == Direction::Cache {
            if let Err(e) = self.ledger.append(&dest) {
                return Err(self.roll_back(command, &dest, e));
            }
        }
        Ok(dest)
    }

    /// A cached file the ledger does not know about would never be evicted,
    /// so an unrecorded cache move is undone.
    fn roll_back(&self, command: &MoveCommand, dest: &Path, cause: Error) -> Error {
        warn!(
            "Could not record {} in ledger ({}), moving it back",
            dest.display(),
            cause
        );
        let restored = parent_of(&command.src)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no parent"))
            .and_then(|src_dir| self.ops.move_file(dest, &src_dir));

        match restored {
            Ok(_) => Error::Other(format!(
                "{} not cached, ledger append failed: {}",
                command.src.display(),
                cause
            )),
            Err(e) => Error::Other(format!(
                "{} left in cache untracked, ledger append failed ({}) and rollback failed ({})",
                dest.display(),
                cause,
                e
            )),
        }
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}
