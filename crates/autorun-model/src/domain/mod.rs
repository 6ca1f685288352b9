mod task_config;
pub use task_config::TaskConfig;

mod every;
pub use every::{Every, Unit};

mod outcome;
pub use outcome::Outcome;

mod run_record;
pub use run_record::RunRecord;

mod history;
pub use history::History;

mod constants;
pub use constants::{KEY_EVERY, KEY_MAX_MEM, KEY_MAX_RUNTIME};

/// Task path relative to the discovery root, `/`-separated.
///
/// Used as the key of [`History`].
pub type TaskKey = String;

/// Wall-clock duration of one run, in seconds.
pub type ElapsedSecs = f64;
