use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "plexcache")]
#[command(about = "Keeps the media you are about to watch on the fast drive", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to Config.toml in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fill the cache with desired media and evict what is no longer wanted
    Run(RunArgs),
    /// Print configuration values as TOML
    PrintConfig,
    /// List files currently recorded as cached
    Ledger,
    /// Remove empty folders left behind in the cache
    Cleanup(CleanupArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Log every action without moving anything
    #[arg(long)]
    pub dry_run: bool,
    /// Refetch watchlist and watched media even if the snapshots are fresh
    #[arg(long)]
    pub force_refresh: bool,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Report empty folders without removing them
    #[arg(long)]
    pub dry_run: bool,
}

impl Commands {
    pub fn is_dry_run(&self) -> bool {
        match self {
            Commands::Run(args) => args.dry_run,
            Commands::Cleanup(args) => args.dry_run,
            _ => false,
        }
    }
}
