use serde::{Deserialize, Serialize};

use crate::{ElapsedSecs, Outcome};

/// Last known run of one task.
///
/// Persisted as a 3-element array `[timestamp, outcome, elapsed]`; the timestamp is empty for tasks that never ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordTuple", into = "RecordTuple")]
pub struct RunRecord {
    pub timestamp: String,
    pub outcome: Outcome,
    pub elapsed: ElapsedSecs,
}

type RecordTuple = (String, Outcome, ElapsedSecs);

impl RunRecord {
    pub fn new(timestamp: impl Into<String>, outcome: Outcome, elapsed: ElapsedSecs) -> Self {
        Self {
            timestamp: timestamp.into(),
            outcome,
            elapsed: elapsed.max(0.0),
        }
    }

    /// Record of a task that is intentionally not scheduled.
    pub fn not_run() -> Self {
        Self {
            timestamp: String::new(),
            outcome: Outcome::NotRun,
            elapsed: 0.0,
        }
    }
}

impl From<RecordTuple> for RunRecord {
    fn from((timestamp, outcome, elapsed): RecordTuple) -> Self {
        Self::new(timestamp, outcome, elapsed)
    }
}

impl From<RunRecord> for RecordTuple {
    fn from(r: RunRecord) -> Self {
        (r.timestamp, r.outcome, r.elapsed)
    }
}
