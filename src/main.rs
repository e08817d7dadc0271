mod commands;
mod logging;
mod reporter;

use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, RunArgs};
use dotenv::dotenv;
use plexcache::cleanup::CacheCleanup;
use plexcache::engine::format_duration;
use plexcache::fs_ops::Size;
use plexcache::ledger::ExcludeLedger;
use plexcache::{AppConfig, Error, RunOptions, TieringEngine};
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let dry_run = args.command.as_ref().is_some_and(Commands::is_dry_run);
    let _guard = logging::init_logger(dry_run);

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let config = match plexcache::config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let outcome = match command {
        Commands::Run(run_args) => run_tiering(&config, &run_args),
        Commands::PrintConfig => print_config(&config),
        Commands::Ledger => print_ledger(&config),
        Commands::Cleanup(cleanup_args) => run_cleanup(&config, cleanup_args.dry_run),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

/// Returns whether the run completed without aborting a batch.
fn run_tiering(config: &AppConfig, args: &RunArgs) -> anyhow::Result<bool> {
    let options = RunOptions {
        dry_run: args.dry_run,
        force_refresh: args.force_refresh,
    };
    let engine = TieringEngine::new(config.clone(), options);
    let source = config.list_source();
    let reporter = CliReporter::new();

    let summary = match engine.run(&source, &reporter) {
        Ok(summary) => summary,
        Err(Error::ActiveSession(count)) => {
            reporter.finish_bar();
            warn!("{} active session(s) in progress, exiting", count);
            return Ok(true);
        }
        Err(err) => {
            reporter.finish_bar();
            return Err(err).context("Tiering run failed");
        }
    };
    reporter.finish_bar();

    println!();
    let moved = |report: &Option<plexcache::mover::MoveReport>| {
        report.as_ref().map_or(0, |r| r.moved.len())
    };
    info!(
        "{} files to cache ({}), {} files to array ({})",
        format!("{}", moved(&summary.cache_moves)).green(),
        format!("{}", Size::from_bytes(summary.cache_bytes)).green(),
        format!("{}", moved(&summary.array_moves)).green(),
        format!("{}", Size::from_bytes(summary.array_bytes)).green(),
    );
    info!(
        "{} evicted, {} ledger entries pruned, {} empty folders cleaned",
        format!("{}", summary.evicted).cyan(),
        format!("{}", summary.ledger_pruned).cyan(),
        format!("{}", summary.folders_cleaned).cyan(),
    );
    if summary.error_count() > 0 {
        warn!(
            "{} moves failed",
            format!("{}", summary.error_count()).red()
        );
    }
    for (direction, reason) in &summary.aborted {
        error!("Moves to {} aborted: {}", direction, reason.red());
    }
    info!(
        "Execution time: {}",
        format_duration(summary.elapsed).green()
    );

    Ok(summary.is_success())
}

fn print_config(config: &AppConfig) -> anyhow::Result<bool> {
    let rendered = toml::to_string_pretty(config).context("Could not render configuration")?;
    println!("{}", rendered);
    Ok(true)
}

fn print_ledger(config: &AppConfig) -> anyhow::Result<bool> {
    let ledger = ExcludeLedger::new(config.ledger_path());
    let entries = ledger.unique_entries();
    if entries.is_empty() {
        info!("Ledger {} is empty", ledger.path().display());
        return Ok(true);
    }

    let mut missing = 0;
    for entry in &entries {
        if entry.exists() {
            println!("{}", entry.display());
        } else {
            missing += 1;
            println!("{} {}", entry.display(), "(missing)".red());
        }
    }
    info!(
        "{} cached files recorded, {} missing",
        format!("{}", entries.len()).green(),
        format!("{}", missing).red()
    );
    Ok(true)
}

fn run_cleanup(config: &AppConfig, dry_run: bool) -> anyhow::Result<bool> {
    let cleanup = CacheCleanup::new(
        config.layout().cache_root(),
        config.paths.library_folders.clone(),
        &config.paths.protected_paths,
    )?;
    let cleaned = cleanup.cleanup(dry_run);
    info!("{} empty folders", format!("{}", cleaned).cyan());
    Ok(true)
}
