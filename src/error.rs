use std::path::PathBuf;

use thiserror::Error;

use crate::tier::Direction;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Refusing to operate on protected path: {}", .0.display())]
    ProtectedPath(PathBuf),

    #[error("Not enough space on {direction} drive: need {needed} bytes, {available} bytes free")]
    InsufficientSpace {
        direction: Direction,
        needed: u64,
        available: u64,
    },

    #[error("{0} active session(s) in progress")]
    ActiveSession(usize),

    #[error("Source error: {0}")]
    Source(String),

    #[error("{0}")]
    Other(String),
}
