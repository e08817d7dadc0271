use crate::tier::Direction;

/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif bars; library callers and tests use
/// `SilentReporter`. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_phase(&self, _name: &str) {}
    fn on_move_start(&self, _direction: Direction, _total: usize) {}
    fn on_move_progress(&self, _direction: Direction, _done: usize, _total: usize) {}
    fn on_move_complete(
        &self,
        _direction: Direction,
        _moved: usize,
        _failed: usize,
        _duration_secs: f64,
    ) {
    }
    fn on_cleanup_complete(&self, _removed: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
