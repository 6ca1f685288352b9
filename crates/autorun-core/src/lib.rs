//! Scheduling core: finds autorun tasks, decides which are due this tick, runs them through a
//! pluggable [`Engine`] and reconciles the persisted [`History`](autorun_model::History).
//!
//! One [`Pass`] is one tick; the program is meant to be re-invoked by an external timer.

pub mod error;
pub use error::{CoreError, ExecError, TaskError};

pub mod clock;
pub mod discovery;
pub use discovery::{DiscoveryConfig, Task, discover};

pub mod extract;
pub use extract::{Extractor, NotebookExtractor};

pub mod trigger;
pub use trigger::{is_due, period_of};

mod unit;
pub use unit::UnitId;

pub mod engine;
pub use engine::{Engine, EngineOutput, Invocation, Limits};

pub mod executor;
pub use executor::{ExecutorConfig, SandboxedExecutor, TaskRun};

pub mod history;
pub use history::{HistoryStore, reconcile, write_atomic};

mod lock;
pub use lock::PassLock;

pub mod pass;
pub use pass::{Pass, PassConfig, PassReport, PassSummary, Reporter};
