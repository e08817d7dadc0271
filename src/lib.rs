pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fs_ops;
pub mod ledger;
pub mod mover;
pub mod platform;
pub mod progress;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod subtitles;
pub mod tier;
pub mod translate;

pub use config::AppConfig;
pub use engine::{RunOptions, RunSummary, TieringEngine};
pub use error::Error;
pub use fs_ops::{FileOps, LocalFileOps};
pub use progress::{ProgressReporter, SilentReporter};
pub use source::{Category, DesiredSource, ListFileSource};
pub use tier::{Direction, TierLayout};
