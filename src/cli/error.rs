//! CLI-specific error types

use crate::config::ConfigError;
use crate::error::MergeError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid input in {0}: {1}")]
    InvalidInput(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Merge failed [{code}]: {0}", code = .0.code())]
    MergeError(#[from] MergeError),

    #[error("History check found {0} violation(s)")]
    HistoryViolations(usize),
}
