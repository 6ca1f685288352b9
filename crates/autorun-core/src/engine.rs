use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use crate::{UnitId, error::ExecError};

/// Resource ceilings handed to the isolation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub memory_mb: u64,
    pub runtime_secs: u64,
}

/// Everything the execution engine needs to run one task.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Absolute path of the task file.
    pub task: PathBuf,
    /// Where the engine writes its rendered artifact.
    pub output: PathBuf,
    /// Name of the isolation unit.
    pub unit: UnitId,
    pub limits: Limits,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// How long to wait for the invocation before giving up on it.
    pub timeout: Duration,
}

/// Observed result of an invocation that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// The opaque execution engine.
///
/// Implementations own process spawning and the isolation boundary, and must enforce
/// [`Invocation::timeout`] themselves (returning [`ExecError::Timeout`]).
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, inv: &Invocation) -> Result<EngineOutput, ExecError>;
}
