use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use autorun_model::{ElapsedSecs, Outcome, TaskConfig};
use tracing::{info, instrument, warn};

use crate::{
    Task, UnitId,
    engine::{Engine, Invocation, Limits},
    error::TaskError,
};

/// How tasks are turned into engine invocations.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Rendered artifacts mirror the task tree under this directory.
    pub output_root: PathBuf,
    /// Extension of rendered artifacts, without the dot.
    pub output_extension: String,
    /// Working directory of every invocation.
    pub working_dir: PathBuf,
    /// Memory ceiling when the task does not set `MaxMem`.
    pub default_mem_mb: u64,
    /// Upper bound for any `MaxMem`.
    pub system_max_mem_mb: u64,
    /// Runtime ceiling when the task does not set `MaxRuntime`.
    pub default_runtime_secs: u64,
    /// Upper bound for any `MaxRuntime`.
    pub system_max_runtime_secs: u64,
    /// Extra wait on top of the runtime ceiling before the capture gives up,
    /// so the isolation boundary enforces the limit first.
    pub capture_grace_secs: u64,
    /// Environment variable set to `1` in every invocation.
    pub env_marker: String,
    /// Captured output kept for diagnostics (tail).
    pub max_captured_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("autorun-output"),
            output_extension: "html".to_string(),
            working_dir: PathBuf::from("."),
            default_mem_mb: 1_024,
            system_max_mem_mb: 4_096,
            default_runtime_secs: 900,
            system_max_runtime_secs: 3_600,
            capture_grace_secs: 5,
            env_marker: "AUTORUN".to_string(),
            max_captured_bytes: 64 * 1024,
        }
    }
}

impl ExecutorConfig {
    /// Resolve a relative output root and working directory against `base`.
    ///
    /// The engine runs in `working_dir`, so a relative output path would otherwise point somewhere else
    /// for the engine than for the executor preparing it.
    pub fn anchored_at(mut self, base: &Path) -> Self {
        if self.output_root.is_relative() {
            self.output_root = base.join(&self.output_root);
        }
        if self.working_dir.is_relative() {
            self.working_dir = base.join(&self.working_dir);
        }
        self
    }

    /// Effective ceilings: the task's request (or the default), capped by the system maximum.
    pub fn limits_for(&self, config: &TaskConfig) -> Limits {
        let memory_mb = config
            .max_mem_mb()
            .unwrap_or(self.default_mem_mb)
            .min(self.system_max_mem_mb);
        let runtime_secs = config
            .max_runtime_secs()
            .unwrap_or(self.default_runtime_secs)
            .min(self.system_max_runtime_secs);
        Limits {
            memory_mb,
            runtime_secs,
        }
    }

    /// `output_root/<relative path>` with the extension swapped for the output extension.
    pub fn output_path(&self, task: &Task) -> PathBuf {
        self.output_root
            .join(&task.key)
            .with_extension(&self.output_extension)
    }

    pub fn invocation(&self, task: &Task, config: &TaskConfig) -> Invocation {
        let limits = self.limits_for(config);
        Invocation {
            task: task.path.clone(),
            output: self.output_path(task),
            unit: UnitId::for_path(&task.path),
            limits,
            cwd: self.working_dir.clone(),
            env: vec![(self.env_marker.clone(), "1".to_string())],
            timeout: Duration::from_secs(limits.runtime_secs + self.capture_grace_secs),
        }
    }
}

/// Result of running one due task.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub outcome: Outcome,
    pub elapsed: ElapsedSecs,
    /// Captured output or error text of a failed run.
    pub diagnostic: Option<String>,
}

/// Runs due tasks through the engine, one at a time, and accounts for the result.
pub struct SandboxedExecutor {
    cfg: ExecutorConfig,
    engine: Arc<dyn Engine>,
}

impl SandboxedExecutor {
    /// Relative paths in `cfg` are taken relative to the current directory.
    pub fn new(cfg: ExecutorConfig, engine: Arc<dyn Engine>) -> Self {
        let cfg = match std::env::current_dir() {
            Ok(cwd) => cfg.anchored_at(&cwd),
            Err(e) => {
                warn!(target: "autorun.core.executor", error = %e, "current directory unknown; paths left relative");
                cfg
            }
        };
        Self { cfg, engine }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.cfg
    }

    /// Run `task` and classify the result.
    ///
    /// Engine failures of any kind become a `failed` run; only preparing the output location can error.
    #[instrument(level = "debug", skip_all, fields(task = %task.key))]
    pub async fn run(&self, task: &Task, config: &TaskConfig) -> Result<TaskRun, TaskError> {
        let inv = self.cfg.invocation(task, config);
        prepare_output(&inv.output)?;

        info!(
            target: "autorun.core.executor",
            engine = self.engine.name(),
            unit = %inv.unit,
            memory_mb = inv.limits.memory_mb,
            runtime_secs = inv.limits.runtime_secs,
            "running task"
        );

        let start = Instant::now();
        let res = self.engine.execute(&inv).await;
        let elapsed = start.elapsed().as_secs_f64();

        let run = match res {
            Ok(out) if out.success() => {
                info!(target: "autorun.core.executor", unit = %inv.unit, elapsed, "task succeeded");
                TaskRun {
                    outcome: Outcome::Success,
                    elapsed,
                    diagnostic: None,
                }
            }
            Ok(out) => {
                let output = tail(&out.combined(), self.cfg.max_captured_bytes);
                warn!(
                    target: "autorun.core.executor",
                    unit = %inv.unit,
                    exit_code = ?out.exit_code,
                    elapsed,
                    output = %output,
                    "task failed"
                );
                TaskRun {
                    outcome: Outcome::Failed,
                    elapsed,
                    diagnostic: Some(output),
                }
            }
            Err(e) => {
                warn!(target: "autorun.core.executor", unit = %inv.unit, elapsed, error = %e, "task invocation failed");
                TaskRun {
                    outcome: Outcome::Failed,
                    elapsed,
                    diagnostic: Some(e.to_string()),
                }
            }
        };
        Ok(run)
    }
}

fn prepare_output(output: &Path) -> Result<(), TaskError> {
    let Some(parent) = output.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|e| TaskError::OutputDir {
        path: parent.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineOutput, error::ExecError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeEngine {
        result: fn() -> Result<EngineOutput, ExecError>,
        seen: Mutex<Vec<Invocation>>,
    }

    impl FakeEngine {
        fn new(result: fn() -> Result<EngineOutput, ExecError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn execute(&self, inv: &Invocation) -> Result<EngineOutput, ExecError> {
            self.seen.lock().unwrap().push(inv.clone());
            (self.result)()
        }
    }

    /// Writes the artifact where the invocation says, as a real engine does.
    struct TouchEngine;

    #[async_trait]
    impl Engine for TouchEngine {
        fn name(&self) -> &'static str {
            "touch"
        }

        async fn execute(&self, inv: &Invocation) -> Result<EngineOutput, ExecError> {
            std::fs::write(&inv.output, "<html></html>")?;
            Ok(EngineOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn exit(code: i32) -> Result<EngineOutput, ExecError> {
        Ok(EngineOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: format!("exit {code}"),
        })
    }

    fn task(root: &Path, key: &str) -> Task {
        Task {
            path: root.join(key),
            key: key.to_string(),
        }
    }

    fn cfg(tmp: &TempDir) -> ExecutorConfig {
        ExecutorConfig {
            output_root: tmp.path().join("out"),
            working_dir: tmp.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn memory_is_capped_by_system_max() {
        let cfg = ExecutorConfig::default();
        let limits = cfg.limits_for(&TaskConfig::new().with("MaxMem", "999999"));
        assert_eq!(limits.memory_mb, 4_096);

        let limits = cfg.limits_for(&TaskConfig::new().with("MaxMem", "256"));
        assert_eq!(limits.memory_mb, 256);

        let limits = cfg.limits_for(&TaskConfig::new());
        assert_eq!(limits.memory_mb, 1_024);
    }

    #[test]
    fn runtime_limit_drives_capture_timeout() {
        let cfg = ExecutorConfig::default();
        let t = task(Path::new("/srv"), "a-autorun.ipynb");

        let inv = cfg.invocation(&t, &TaskConfig::new().with("MaxRuntime", "120"));
        assert_eq!(inv.limits.runtime_secs, 120);
        assert_eq!(inv.timeout, Duration::from_secs(125));

        let inv = cfg.invocation(&t, &TaskConfig::new().with("MaxRuntime", "86400"));
        assert_eq!(inv.limits.runtime_secs, 3_600);
    }

    #[test]
    fn output_mirrors_relative_path() {
        let cfg = ExecutorConfig {
            output_root: PathBuf::from("/srv/out"),
            ..Default::default()
        };
        let t = task(Path::new("/srv/nb"), "team/weekly-autorun.ipynb");
        assert_eq!(
            cfg.output_path(&t),
            PathBuf::from("/srv/out/team/weekly-autorun.html")
        );
    }

    #[test]
    fn invocation_carries_marker_and_unit() {
        let cfg = ExecutorConfig::default();
        let t = task(Path::new("/srv/nb"), "a-autorun.ipynb");
        let inv = cfg.invocation(&t, &TaskConfig::new());
        assert_eq!(inv.env, vec![("AUTORUN".to_string(), "1".to_string())]);
        assert_eq!(inv.unit, UnitId::for_path(&t.path));
        assert_eq!(inv.cwd, PathBuf::from("."));
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let tmp = TempDir::new().unwrap();
        let engine = FakeEngine::new(|| exit(0));
        let exec = SandboxedExecutor::new(cfg(&tmp), engine.clone());

        let run = exec
            .run(&task(tmp.path(), "sub/a-autorun.ipynb"), &TaskConfig::new())
            .await
            .unwrap();
        assert_eq!(run.outcome, Outcome::Success);
        assert!(run.elapsed >= 0.0);
        assert!(run.diagnostic.is_none());
        assert!(tmp.path().join("out/sub").is_dir());
        assert_eq!(engine.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed_with_output() {
        let tmp = TempDir::new().unwrap();
        let exec = SandboxedExecutor::new(cfg(&tmp), FakeEngine::new(|| exit(3)));

        let run = exec
            .run(&task(tmp.path(), "a-autorun.ipynb"), &TaskConfig::new())
            .await
            .unwrap();
        assert_eq!(run.outcome, Outcome::Failed);
        assert!(run.elapsed >= 0.0);
        assert_eq!(run.diagnostic.as_deref(), Some("exit 3"));
    }

    #[tokio::test]
    async fn engine_errors_are_failed_runs() {
        let tmp = TempDir::new().unwrap();
        let exec = SandboxedExecutor::new(
            cfg(&tmp),
            FakeEngine::new(|| Err(ExecError::Timeout { secs: 5 })),
        );

        let run = exec
            .run(&task(tmp.path(), "a-autorun.ipynb"), &TaskConfig::new())
            .await
            .unwrap();
        assert_eq!(run.outcome, Outcome::Failed);
        assert!(run.diagnostic.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn unwritable_output_location_is_a_task_error() {
        let tmp = TempDir::new().unwrap();
        // A file where the output directory should be.
        std::fs::write(tmp.path().join("out"), "").unwrap();
        let exec = SandboxedExecutor::new(cfg(&tmp), FakeEngine::new(|| exit(0)));

        let res = exec
            .run(&task(tmp.path(), "sub/a-autorun.ipynb"), &TaskConfig::new())
            .await;
        assert!(matches!(res, Err(TaskError::OutputDir { .. })));
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("0123456789", 4), "…6789");
        // multi-byte boundary
        assert_eq!(tail("ééé", 3), "…é");
    }

    #[test]
    fn relative_paths_are_anchored_once() {
        let cfg = ExecutorConfig {
            output_root: PathBuf::from("autorun-output"),
            working_dir: PathBuf::from("notebooks"),
            ..Default::default()
        }
        .anchored_at(Path::new("/srv"));
        assert_eq!(cfg.output_root, PathBuf::from("/srv/autorun-output"));
        assert_eq!(cfg.working_dir, PathBuf::from("/srv/notebooks"));

        let again = cfg.clone().anchored_at(Path::new("/elsewhere"));
        assert_eq!(again.output_root, cfg.output_root);
    }

    #[tokio::test]
    async fn relative_output_root_lands_where_it_was_prepared() {
        let base = TempDir::new().unwrap();
        let wd = TempDir::new().unwrap();
        let cfg = ExecutorConfig {
            output_root: PathBuf::from("autorun-output"),
            working_dir: wd.path().to_path_buf(),
            ..Default::default()
        }
        .anchored_at(base.path());
        let exec = SandboxedExecutor::new(cfg, Arc::new(TouchEngine));

        let run = exec
            .run(&task(wd.path(), "team/a-autorun.ipynb"), &TaskConfig::new())
            .await
            .unwrap();
        assert_eq!(run.outcome, Outcome::Success);
        assert!(base.path().join("autorun-output/team/a-autorun.html").is_file());
        assert!(!wd.path().join("autorun-output").exists());
    }
}
