//! Transient systemd units.
//!
//! Each run becomes `systemd-run --unit=<id> --collect --wait --pipe ...`: named after the task, memory and
//! runtime capped by the unit's cgroup, and garbage-collected by systemd whether it succeeds or fails.
//! A previous run still alive under the same name makes `systemd-run` refuse the new one, so one task never
//! runs twice concurrently.
use autorun_core::Invocation;

/// Arguments for `systemd-run` wrapping `program args...`.
pub fn wrap(inv: &Invocation, user: bool, program: &str, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(16 + inv.env.len() + args.len());
    if user {
        argv.push("--user".to_string());
    }
    argv.extend([
        format!("--unit={}", inv.unit),
        "--collect".to_string(),
        "--wait".to_string(),
        "--pipe".to_string(),
        "--quiet".to_string(),
        format!("--working-directory={}", inv.cwd.display()),
        "--property".to_string(),
        format!("MemoryMax={}M", inv.limits.memory_mb),
        "--property".to_string(),
        "MemorySwapMax=0".to_string(),
        "--property".to_string(),
        format!("RuntimeMaxSec={}", inv.limits.runtime_secs),
    ]);
    for (k, v) in &inv.env {
        argv.push(format!("--setenv={k}={v}"));
    }
    argv.push("--".to_string());
    argv.push(program.to_string());
    argv.extend(args.iter().cloned());
    argv
}

/// `systemd-run`'s own complaint when it could not start the unit at all.
///
/// A previous run still holding the unit name ends up here, as does a missing bus connection.
pub fn start_failure(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Failed to start transient") || l.starts_with("Failed to connect to bus"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorun_core::{Limits, UnitId};
    use std::{path::PathBuf, time::Duration};

    fn inv() -> Invocation {
        Invocation {
            task: PathBuf::from("/srv/nb/a-autorun.ipynb"),
            output: PathBuf::from("/srv/out/a-autorun.html"),
            unit: UnitId::for_path(&PathBuf::from("/srv/nb/a-autorun.ipynb")),
            limits: Limits {
                memory_mb: 512,
                runtime_secs: 300,
            },
            cwd: PathBuf::from("/srv/nb"),
            env: vec![("AUTORUN".into(), "1".into())],
            timeout: Duration::from_secs(305),
        }
    }

    #[test]
    fn wraps_engine_command_in_named_capped_unit() {
        let inv = inv();
        let argv = wrap(&inv, false, "jupyter", &["nbconvert".to_string()]);

        assert_eq!(argv[0], format!("--unit={}", inv.unit));
        for expected in [
            "--collect",
            "--wait",
            "--pipe",
            "--working-directory=/srv/nb",
            "MemoryMax=512M",
            "RuntimeMaxSec=300",
            "--setenv=AUTORUN=1",
        ] {
            assert!(argv.iter().any(|a| a == expected), "missing {expected}");
        }
        assert!(!argv.iter().any(|a| a == "--user"));

        let sep = argv.iter().position(|a| a == "--").unwrap();
        assert_eq!(&argv[sep + 1..], ["jupyter", "nbconvert"]);
    }

    #[test]
    fn user_manager_flag_comes_first() {
        let argv = wrap(&inv(), true, "true", &[]);
        assert_eq!(argv[0], "--user");
        assert_eq!(argv.last().map(String::as_str), Some("true"));
    }

    #[test]
    fn unit_name_clash_is_a_start_failure() {
        let stderr = "Failed to start transient service unit: Unit autorun-0a1b2c3d4e5f-a-autorun.ipynb.service was already loaded or has a fragment file.\n";
        assert!(start_failure(stderr).is_some_and(|l| l.contains("already loaded")));
    }

    #[test]
    fn engine_output_is_not_a_start_failure() {
        assert_eq!(start_failure("Traceback (most recent call last):\nValueError\n"), None);
        assert_eq!(start_failure(""), None);
    }
}
