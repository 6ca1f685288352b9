use std::path::PathBuf;

use thiserror::Error;

/// Pass-level failures.
///
/// Only these abort a pass; everything that happens to a single task is contained in [`TaskError`] or
/// folded into its outcome.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("discovery failed under {root}: {reason}")]
    Discovery { root: PathBuf, reason: String },
    #[error("failed to persist history to {path}: {reason}")]
    History { path: PathBuf, reason: String },
    #[error("failed to acquire pass lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },
    #[error("another pass holds {0}")]
    Busy(PathBuf),
    #[error("report failed: {0}")]
    Report(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

/// Failures of one engine invocation.
///
/// All of them are accounted as a `failed` run.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("isolation boundary rejected the unit: {0}")]
    Isolation(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

/// Unexpected failure while handling a single task.
///
/// Logged and contained; the task is left out of the pass results.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("failed to prepare output directory {path}: {reason}")]
    OutputDir { path: PathBuf, reason: String },
}
