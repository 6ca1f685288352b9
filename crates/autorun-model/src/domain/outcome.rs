use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of the most recent handling of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The engine exited cleanly.
    #[serde(rename = "success")]
    Success,
    /// Non-zero exit, signal, timeout or spawn failure.
    #[serde(rename = "failed")]
    Failed,
    /// The task carries no trigger metadata, or has not run yet.
    #[serde(rename = "not run")]
    NotRun,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::NotRun => "not run",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
