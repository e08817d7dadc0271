use std::env;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/plexcache.log";

/// Default filter when `TRACING_LEVEL` is unset. Dry runs exist to show every
/// decision, so they log at debug.
fn default_level(dry_run: bool) -> &'static str {
    if dry_run {
        "debug"
    } else {
        "info"
    }
}

/// Stdout plus file logging. The file layer carries thread names so lines
/// from the mover pools (`mover-cache-N`, `mover-array-N`) can be told apart.
pub fn init_logger(dry_run: bool) -> impl Drop {
    let filter =
        env::var("TRACING_LEVEL").unwrap_or_else(|_| default_level(dry_run).to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

    let file_appender = tracing_appender::rolling::never("./", &log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!("Logging to stdout and {}", log_file_path);
    if dry_run {
        warn!("DRY RUN: the log below describes moves that are not performed");
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_logs_at_debug() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}
