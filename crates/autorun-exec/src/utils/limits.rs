//! POSIX rlimit-based resource limits for directly spawned engine processes.
//!
//! ## Overview
//!
//! Used by [`Isolation::Direct`](crate::Isolation::Direct), where no systemd unit enforces the memory ceiling.
//! - On **Unix platforms** (`Linux`, `macOS`, `*BSD`):
//!   limits are applied inside a `pre_exec` hook, executed in the child process after `fork()` and immediately before `execve()`.
//!   The engine never runs without the intended restrictions.
//! - On **non-Unix platforms**, rlimits are not supported.
//!   The module emits a warning and treats the request as a no-op.
use tokio::process::Command;
#[cfg(not(unix))]
use tracing::warn;

/// Declarative rlimit set for a child process.
///
/// `None` means "no explicit limit" for that resource.
#[derive(Debug, Clone, Default)]
pub struct RlimitConfig {
    /// Maximum virtual address space in bytes (`RLIMIT_AS`).
    ///
    /// The closest per-process stand-in for a cgroup memory ceiling: allocations beyond it fail
    /// instead of the process being OOM-killed.
    pub max_address_space_bytes: Option<u64>,

    /// Maximum number of open file descriptors (`RLIMIT_NOFILE`).
    pub max_open_files: Option<u64>,

    /// Disable core dumps (`RLIMIT_CORE = 0`) when set to `true`.
    ///
    /// Crashing kernels would otherwise leave large core files next to the notebooks.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    /// Limits for an engine with the given memory ceiling.
    pub fn for_memory_mb(memory_mb: u64) -> Self {
        Self {
            max_address_space_bytes: Some(memory_mb.saturating_mul(1024 * 1024)),
            max_open_files: None,
            disable_core_dumps: true,
        }
    }

    /// Returns `true` if no explicit limits are configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_address_space_bytes.is_none()
            && self.max_open_files.is_none()
            && !self.disable_core_dumps
    }
}

/// Attach `rlimit`-based process limits to a `tokio::process::Command`.
///
/// On Unix installs a `pre_exec` hook that calls `setrlimit` in the child before `execve`;
/// elsewhere logs a warning if `config` is non-empty and does nothing.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        unix_impl::attach_rlimits(cmd, config);
    }

    #[cfg(not(unix))]
    {
        warn!(
            target: "autorun.exec.limits",
            ?config,
            "rlimit-based process limits requested on a non-Unix OS; limits will be ignored"
        );
    }
}

#[cfg(unix)]
mod unix_impl {
    use super::RlimitConfig;

    use std::io;

    use tokio::process::Command;

    pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
        let max_address_space = config.max_address_space_bytes;
        let max_open_files = config.max_open_files;
        let disable_core_dumps = config.disable_core_dumps;

        // SAFETY: the hook only calls async-signal-safe `setrlimit` and touches no shared state.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(bytes) = max_address_space {
                    apply_rlimit(libc::RLIMIT_AS, bytes)?;
                }
                if let Some(nofile) = max_open_files {
                    apply_rlimit(libc::RLIMIT_NOFILE, nofile)?;
                }
                if disable_core_dumps {
                    apply_rlimit(libc::RLIMIT_CORE, 0)?;
                }
                Ok(())
            });
        }
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    type Resource = libc::__rlimit_resource_t;
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    type Resource = libc::c_int;

    fn apply_rlimit(resource: Resource, value: u64) -> io::Result<()> {
        let rlim = libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        };

        let rc = unsafe { libc::setrlimit(resource, &rlim) };
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
