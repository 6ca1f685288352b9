//! Process-backed execution engine: runs the notebook engine command inside a transient systemd unit,
//! or directly under POSIX rlimits where systemd is not available.

mod util;
pub mod utils;

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::{EngineConfig, Isolation, ProcessEngine};

pub use autorun_core::{ExecError, Invocation};

pub mod prelude {
    pub use crate::utils::limits::{RlimitConfig, attach_rlimits};
    #[cfg(feature = "proc")]
    pub use crate::{EngineConfig, Isolation, ProcessEngine};
    pub use autorun_core::{Engine, EngineOutput, ExecError};
}
