use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use plexcache::fs_ops::{FileOps, LocalFileOps, Size};
use plexcache::ledger::ExcludeLedger;
use plexcache::mover::ConcurrentMover;
use plexcache::{Direction, SilentReporter, TierLayout};
use tempfile::{tempdir, TempDir};

struct Tiers {
    _tmp: TempDir,
    real: PathBuf,
    cache: PathBuf,
    ledger: PathBuf,
}

impl Tiers {
    fn new() -> Self {
        let tmp = tempdir().unwrap();
        let real = tmp.path().join("array");
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&real).unwrap();
        fs::create_dir_all(&cache).unwrap();
        let ledger = tmp.path().join("exclude.txt");
        Self {
            _tmp: tmp,
            real,
            cache,
            ledger,
        }
    }

    fn layout(&self) -> TierLayout {
        TierLayout::new(&self.real, &self.cache, None)
    }

    fn media(&self, rel: &str) -> PathBuf {
        let path = self.real.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, rel).unwrap();
        path
    }

    fn mover(&self, ops: Arc<dyn FileOps>, workers: usize, dry_run: bool) -> ConcurrentMover {
        ConcurrentMover::new(
            self.layout(),
            ops,
            Arc::new(ExcludeLedger::new(&self.ledger)),
            workers,
            workers,
            dry_run,
        )
    }
}

/// Delegates to `LocalFileOps`, recording the highest number of moves in
/// flight at once.
struct CountingOps {
    inner: LocalFileOps,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingOps {
    fn new() -> Self {
        Self {
            inner: LocalFileOps::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FileOps for CountingOps {
    fn move_file(&self, src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        let result = self.inner.move_file(src, dest_dir);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn create_dir_with_permissions(&self, dir: &Path, reference: &Path) -> io::Result<()> {
        self.inner.create_dir_with_permissions(dir, reference)
    }

    fn free_space(&self, path: &Path) -> io::Result<Size> {
        self.inner.free_space(path)
    }

    fn total_size(&self, files: &[PathBuf]) -> Size {
        self.inner.total_size(files)
    }
}

/// Fails every move whose source name contains "broken".
struct FlakyOps(LocalFileOps);

impl FileOps for FlakyOps {
    fn move_file(&self, src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
        if src.to_string_lossy().contains("broken") {
            return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
        }
        self.0.move_file(src, dest_dir)
    }

    fn create_dir_with_permissions(&self, dir: &Path, reference: &Path) -> io::Result<()> {
        self.0.create_dir_with_permissions(dir, reference)
    }

    fn free_space(&self, path: &Path) -> io::Result<Size> {
        self.0.free_space(path)
    }

    fn total_size(&self, files: &[PathBuf]) -> Size {
        self.0.total_size(files)
    }
}

#[test]
fn test_cache_move_records_destination_in_ledger() {
    let t = Tiers::new();
    let file = t.media("TV/Show/Season 1/e01.mkv");
    let mover = t.mover(Arc::new(LocalFileOps::default()), 2, false);

    let report = mover
        .move_files(&[file.clone()], Direction::Cache, &SilentReporter)
        .unwrap();

    let cached = t.cache.join("TV/Show/Season 1/e01.mkv");
    assert_eq!(report.moved, vec![cached.clone()]);
    assert_eq!(report.error_count(), 0);
    assert!(cached.is_file(), "file should now live in the cache");
    assert!(!file.exists(), "array copy should be gone");
    assert_eq!(ExcludeLedger::new(&t.ledger).read_all(), vec![cached]);
}

#[test]
fn test_cache_move_twice_is_idempotent() {
    let t = Tiers::new();
    let files = vec![
        t.media("TV/Show/Season 1/e01.mkv"),
        t.media("Movies/Film (2020)/Film.mkv"),
    ];
    let mover = t.mover(Arc::new(LocalFileOps::default()), 3, false);

    mover
        .move_files(&files, Direction::Cache, &SilentReporter)
        .unwrap();
    let ledger_after_first = fs::read_to_string(&t.ledger).unwrap();

    let second = mover
        .move_files(&files, Direction::Cache, &SilentReporter)
        .unwrap();

    assert_eq!(second.planned, 0, "second run should plan nothing");
    assert!(second.moved.is_empty());
    assert_eq!(fs::read_to_string(&t.ledger).unwrap(), ledger_after_first);
    assert_eq!(ExcludeLedger::new(&t.ledger).read_all().len(), 2);
}

#[test]
fn test_array_move_returns_file_without_touching_ledger() {
    let t = Tiers::new();
    let cached = t.cache.join("Movies/Film.mkv");
    fs::create_dir_all(cached.parent().unwrap()).unwrap();
    fs::write(&cached, "film").unwrap();
    let mover = t.mover(Arc::new(LocalFileOps::default()), 1, false);

    let report = mover
        .move_files(&[t.real.join("Movies/Film.mkv")], Direction::Array, &SilentReporter)
        .unwrap();

    assert_eq!(report.moved, vec![t.real.join("Movies/Film.mkv")]);
    assert!(!cached.exists());
    assert!(!t.ledger.exists(), "array moves never write the ledger");
}

#[test]
fn test_dry_run_moves_nothing() {
    let t = Tiers::new();
    let file = t.media("Movies/Film.mkv");
    let mover = t.mover(Arc::new(LocalFileOps::default()), 2, true);

    let report = mover
        .move_files(&[file.clone()], Direction::Cache, &SilentReporter)
        .unwrap();

    assert_eq!(report.planned, 1);
    assert!(report.moved.is_empty());
    assert!(file.is_file());
    assert!(!t.cache.join("Movies").exists(), "no directories created");
    assert!(!t.ledger.exists());
}

#[test]
fn test_concurrency_never_exceeds_limit() {
    let t = Tiers::new();
    let files: Vec<PathBuf> = (0..12)
        .map(|i| t.media(&format!("TV/Show/Season 1/e{:02}.mkv", i)))
        .collect();
    let ops = Arc::new(CountingOps::new());
    let mover = t.mover(ops.clone(), 3, false);

    let report = mover
        .move_files(&files, Direction::Cache, &SilentReporter)
        .unwrap();

    assert_eq!(report.moved.len(), 12);
    let peak = ops.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "{} moves ran at once with a limit of 3", peak);
    assert!(peak >= 1);
}

#[test]
fn test_failed_move_is_reported_and_not_recorded() {
    let t = Tiers::new();
    let good = t.media("Movies/good.mkv");
    let bad = t.media("Movies/broken.mkv");
    let mover = t.mover(Arc::new(FlakyOps(LocalFileOps::default())), 2, false);

    let report = mover
        .move_files(&[good, bad.clone()], Direction::Cache, &SilentReporter)
        .unwrap();

    assert_eq!(report.moved, vec![t.cache.join("Movies/good.mkv")]);
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.failed[0].0, bad);
    assert_eq!(
        ExcludeLedger::new(&t.ledger).read_all(),
        vec![t.cache.join("Movies/good.mkv")]
    );
}

#[test]
fn test_unrecorded_cache_move_is_rolled_back() {
    let t = Tiers::new();
    let file = t.media("Movies/A/A.mkv");
    // a directory where the ledger file should be makes every append fail
    fs::create_dir_all(&t.ledger).unwrap();
    let mover = t.mover(Arc::new(LocalFileOps::default()), 1, false);

    let report = mover
        .move_files(&[file.clone()], Direction::Cache, &SilentReporter)
        .unwrap();

    assert!(report.moved.is_empty());
    assert_eq!(report.error_count(), 1);
    assert!(file.is_file(), "file should be back on the array");
    assert!(!t.cache.join("Movies/A/A.mkv").exists(), "no untracked cache copy");

    fs::remove_dir(&t.ledger).unwrap();
    let retry = mover
        .move_files(&[file], Direction::Cache, &SilentReporter)
        .unwrap();
    assert_eq!(retry.moved, vec![t.cache.join("Movies/A/A.mkv")]);
    assert_eq!(
        ExcludeLedger::new(&t.ledger).read_all(),
        vec![t.cache.join("Movies/A/A.mkv")]
    );
}
