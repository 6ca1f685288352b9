use std::process::Stdio;

use async_trait::async_trait;
use autorun_core::{Engine, EngineOutput, ExecError, Invocation};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
};
use tracing::{debug, trace, warn};

use crate::{
    util::kill_graceful,
    utils::limits::{RlimitConfig, attach_rlimits},
};

pub mod systemd;

/// The notebook engine command.
///
/// Arguments may contain placeholders filled per invocation:
/// `{input}` (task path), `{output}` (artifact path), `{output_dir}`, `{output_name}` (artifact file stem).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "jupyter".to_string(),
            args: [
                "nbconvert",
                "--execute",
                "--to",
                "html",
                "--output-dir",
                "{output_dir}",
                "--output",
                "{output_name}",
                "{input}",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl EngineConfig {
    /// Arguments with placeholders substituted for `inv`.
    pub fn render_args(&self, inv: &Invocation) -> Vec<String> {
        let input = inv.task.display().to_string();
        let output = inv.output.display().to_string();
        let output_dir = inv
            .output
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let output_name = inv
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.args
            .iter()
            .map(|a| {
                a.replace("{input}", &input)
                    .replace("{output_dir}", &output_dir)
                    .replace("{output_name}", &output_name)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

/// Where the engine process runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Isolation {
    /// Transient systemd unit via `systemd-run`; `user` targets the per-user manager.
    Systemd { user: bool },
    /// Plain child process under POSIX rlimits.
    Direct,
}

impl Default for Isolation {
    fn default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                Isolation::Systemd { user: false }
            } else {
                Isolation::Direct
            }
        }
    }
}

/// [`Engine`] that spawns the configured command and captures its output.
pub struct ProcessEngine {
    name: &'static str,
    cfg: EngineConfig,
    isolation: Isolation,
    systemd_run: String,
}

impl ProcessEngine {
    pub fn new(cfg: EngineConfig, isolation: Isolation) -> Self {
        Self {
            name: "proc",
            cfg,
            isolation,
            systemd_run: "systemd-run".to_string(),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Override the `systemd-run` binary (absolute path, or a wrapper).
    pub fn with_systemd_run(mut self, path: impl Into<String>) -> Self {
        self.systemd_run = path.into();
        self
    }

    /// Program and arguments actually spawned for `inv`.
    pub fn command_line(&self, inv: &Invocation) -> (String, Vec<String>) {
        let args = self.cfg.render_args(inv);
        match self.isolation {
            Isolation::Systemd { user } => (
                self.systemd_run.clone(),
                systemd::wrap(inv, user, &self.cfg.program, &args),
            ),
            Isolation::Direct => (self.cfg.program.clone(), args),
        }
    }

    fn build_command(&self, inv: &Invocation) -> (String, Command) {
        let (program, args) = self.command_line(inv);

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(&inv.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        if self.isolation == Isolation::Direct {
            for (k, v) in &inv.env {
                cmd.env(k, v);
            }
            attach_rlimits(&mut cmd, &RlimitConfig::for_memory_mb(inv.limits.memory_mb));
        }
        (program, cmd)
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, inv: &Invocation) -> Result<EngineOutput, ExecError> {
        let (program, mut cmd) = self.build_command(inv);
        trace!(target: "autorun.exec.proc", %program, unit = %inv.unit, isolation = ?self.isolation, "spawn");

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{program}: {e}")))?;
        let group = child.id();

        // The deadline covers draining the pipes too: a background descendant holding them open
        // keeps the run going after the direct child exits.
        let stdout = read_all(child.stdout.take());
        let stderr = read_all(child.stderr.take());
        let wait = child.wait();
        let finished = tokio::time::timeout(inv.timeout, async move {
            tokio::join!(wait, stdout, stderr)
        })
        .await;

        let Ok((status, stdout, stderr)) = finished else {
            warn!(target: "autorun.exec.proc", unit = %inv.unit, timeout_secs = inv.timeout.as_secs(), "timed out; killing process group");
            let _ = kill_graceful(&mut child, group).await;
            return Err(ExecError::Timeout {
                secs: inv.timeout.as_secs(),
            });
        };
        let status = status?;
        debug!(target: "autorun.exec.proc", unit = %inv.unit, code = ?status.code(), "exited");

        if matches!(self.isolation, Isolation::Systemd { .. })
            && !status.success()
            && let Some(reason) = systemd::start_failure(&stderr)
        {
            return Err(ExecError::Isolation(reason.to_string()));
        }

        Ok(EngineOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn read_all<R>(stream: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorun_core::{Limits, UnitId};
    use std::{path::Path, time::Duration};
    use tempfile::TempDir;

    fn inv(cwd: &Path, timeout: Duration) -> Invocation {
        let task = cwd.join("nb/a-autorun.ipynb");
        Invocation {
            unit: UnitId::for_path(&task),
            output: cwd.join("out/a-autorun.html"),
            task,
            limits: Limits {
                memory_mb: 1_024,
                runtime_secs: timeout.as_secs(),
            },
            cwd: cwd.to_path_buf(),
            env: vec![("AUTORUN".into(), "1".into())],
            timeout,
        }
    }

    fn sh(script: &str) -> ProcessEngine {
        ProcessEngine::new(
            EngineConfig {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            },
            Isolation::Direct,
        )
    }

    #[test]
    fn default_args_target_output_location() {
        let inv = inv(Path::new("/srv"), Duration::from_secs(10));
        let args = EngineConfig::default().render_args(&inv);
        assert_eq!(
            args,
            [
                "nbconvert",
                "--execute",
                "--to",
                "html",
                "--output-dir",
                "/srv/out",
                "--output",
                "a-autorun",
                "/srv/nb/a-autorun.ipynb",
            ]
        );
    }

    #[test]
    fn output_placeholder_is_full_path() {
        let inv = inv(Path::new("/srv"), Duration::from_secs(10));
        let cfg = EngineConfig {
            program: "papermill".to_string(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
        };
        assert_eq!(
            cfg.render_args(&inv),
            ["/srv/nb/a-autorun.ipynb", "/srv/out/a-autorun.html"]
        );
    }

    #[test]
    fn systemd_isolation_wraps_command() {
        let inv = inv(Path::new("/srv"), Duration::from_secs(10));
        let engine = ProcessEngine::new(EngineConfig::default(), Isolation::Systemd { user: true })
            .with_systemd_run("/usr/bin/systemd-run");

        let (program, args) = engine.command_line(&inv);
        assert_eq!(program, "/usr/bin/systemd-run");
        assert_eq!(args[0], "--user");
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "jupyter");
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let tmp = TempDir::new().unwrap();
        let out = sh("echo hello")
            .execute(&inv(tmp.path(), Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_captures_both_streams() {
        let tmp = TempDir::new().unwrap();
        let out = sh("echo partial; echo Traceback >&2; exit 3")
            .execute(&inv(tmp.path(), Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.combined(), "partial\nTraceback\n");
    }

    #[tokio::test]
    async fn marker_env_and_working_directory_are_set() {
        let tmp = TempDir::new().unwrap();
        let out = sh(r#"test "$AUTORUN" = 1 && touch ran-here"#)
            .execute(&inv(tmp.path(), Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(out.success());
        assert!(tmp.path().join("ran-here").exists());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let tmp = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let res = sh("sleep 30")
            .execute(&inv(tmp.path(), Duration::from_millis(200)))
            .await;
        assert!(matches!(res, Err(ExecError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let engine = ProcessEngine::new(
            EngineConfig {
                program: "/nonexistent/autorun-engine".to_string(),
                args: vec![],
            },
            Isolation::Direct,
        );
        let res = engine
            .execute(&inv(tmp.path(), Duration::from_secs(10)))
            .await;
        assert!(matches!(res, Err(ExecError::Spawn(_))));
    }

    #[tokio::test]
    async fn background_descendant_is_bounded_by_the_deadline() {
        let tmp = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let res = sh("sleep 30 & exit 0")
            .execute(&inv(tmp.path(), Duration::from_millis(500)))
            .await;
        assert!(matches!(res, Err(ExecError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refused_unit_is_an_isolation_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let fake = tmp.path().join("systemd-run");
        std::fs::write(
            &fake,
            "#!/bin/sh\necho 'Failed to start transient service unit: Unit x.service already exists.' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = ProcessEngine::new(EngineConfig::default(), Isolation::Systemd { user: false })
            .with_systemd_run(fake.display().to_string());
        let res = engine
            .execute(&inv(tmp.path(), Duration::from_secs(10)))
            .await;
        assert!(matches!(res, Err(ExecError::Isolation(reason)) if reason.contains("already exists")));
    }
}
