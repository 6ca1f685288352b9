use std::path::{Path, PathBuf};

use autorun_core::{DiscoveryConfig, ExecutorConfig, PassConfig};
use autorun_exec::{EngineConfig, Isolation};
use autorun_observe::{LoggerConfig, LoggerError, LoggerFormat};
use clap::{Parser, ValueEnum};

/// Run every due autorun notebook once, then update the history and the status page.
///
/// Meant to be started by an external timer (cron, systemd timer) at least once a minute.
#[derive(Debug, Parser)]
#[command(name = "autorun", version)]
pub struct Args {
    /// Directory searched recursively for task notebooks.
    #[arg(long, env = "AUTORUN_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Directory receiving rendered notebooks and the status page.
    #[arg(long, env = "AUTORUN_OUTPUT", default_value = "autorun-output")]
    pub output: PathBuf,

    /// History file.
    #[arg(long, env = "AUTORUN_STATE", default_value = "autorun-state/history.json")]
    pub state: PathBuf,

    /// Pass lock file [default: `autorun.lock` next to the history file].
    #[arg(long, env = "AUTORUN_LOCK")]
    pub lock: Option<PathBuf>,

    /// Status page [default: `index.html` in the output directory].
    #[arg(long, env = "AUTORUN_REPORT")]
    pub report: Option<PathBuf>,

    /// Title of the status page.
    #[arg(long, env = "AUTORUN_TITLE", default_value = "autorun")]
    pub title: String,

    /// Substring a task file name must contain.
    #[arg(long, env = "AUTORUN_MARKER", default_value = "autorun")]
    pub marker: String,

    /// Task file extension.
    #[arg(long, env = "AUTORUN_EXTENSION", default_value = "ipynb")]
    pub extension: String,

    /// Extension of rendered artifacts.
    #[arg(long, env = "AUTORUN_OUTPUT_EXTENSION", default_value = "html")]
    pub output_extension: String,

    /// Notebook engine program.
    #[arg(long, env = "AUTORUN_ENGINE")]
    pub engine: Option<String>,

    /// Engine arguments; `{input}`, `{output}`, `{output_dir}` and `{output_name}` are substituted.
    #[arg(long = "engine-arg", env = "AUTORUN_ENGINE_ARGS", value_delimiter = ' ', allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    #[arg(long, env = "AUTORUN_ISOLATION", value_enum, default_value_t = IsolationArg::default())]
    pub isolation: IsolationArg,

    /// `systemd-run` binary used by the systemd isolation modes.
    #[arg(long, env = "AUTORUN_SYSTEMD_RUN", default_value = "systemd-run")]
    pub systemd_run: String,

    /// Memory ceiling (MB) for tasks without `MaxMem`.
    #[arg(long, env = "AUTORUN_DEFAULT_MEM_MB", default_value_t = 1_024)]
    pub default_mem_mb: u64,

    /// Upper bound (MB) for any task's memory ceiling.
    #[arg(long, env = "AUTORUN_MAX_MEM_MB", default_value_t = 4_096)]
    pub max_mem_mb: u64,

    /// Runtime ceiling (seconds) for tasks without `MaxRuntime`.
    #[arg(long = "default-runtime", env = "AUTORUN_DEFAULT_RUNTIME", default_value_t = 900)]
    pub default_runtime_secs: u64,

    /// Upper bound (seconds) for any task's runtime ceiling.
    #[arg(long = "max-runtime", env = "AUTORUN_MAX_RUNTIME", default_value_t = 3_600)]
    pub max_runtime_secs: u64,

    /// Evaluate the pass as of this epoch second instead of the clock.
    #[arg(long)]
    pub now: Option<i64>,

    /// Evaluate triggers only; nothing is executed, persisted or rendered.
    #[arg(long)]
    pub dry_run: bool,

    /// `EnvFilter` directive.
    #[arg(long, env = "AUTORUN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// `auto`, `text`, `json` or `journald`.
    #[arg(long, env = "AUTORUN_LOG_FORMAT", default_value = "auto")]
    pub log_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IsolationArg {
    /// Transient unit under the system manager.
    Systemd,
    /// Transient unit under the calling user's manager.
    SystemdUser,
    /// Plain child process with rlimits.
    Direct,
}

impl Default for IsolationArg {
    fn default() -> Self {
        match Isolation::default() {
            Isolation::Systemd { user: false } => IsolationArg::Systemd,
            Isolation::Systemd { user: true } => IsolationArg::SystemdUser,
            Isolation::Direct => IsolationArg::Direct,
        }
    }
}

impl From<IsolationArg> for Isolation {
    fn from(a: IsolationArg) -> Self {
        match a {
            IsolationArg::Systemd => Isolation::Systemd { user: false },
            IsolationArg::SystemdUser => Isolation::Systemd { user: true },
            IsolationArg::Direct => Isolation::Direct,
        }
    }
}

impl Args {
    /// Resolve every relative path flag against `cwd`.
    ///
    /// The engine runs in the discovery root, not the directory `autorun` was started from.
    pub fn anchored_at(mut self, cwd: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = cwd.join(&*p);
            }
        };
        anchor(&mut self.root);
        anchor(&mut self.output);
        anchor(&mut self.state);
        if let Some(lock) = self.lock.as_mut() {
            anchor(lock);
        }
        if let Some(report) = self.report.as_mut() {
            anchor(report);
        }
        self
    }

    pub fn logger(&self) -> Result<LoggerConfig, LoggerError> {
        Ok(LoggerConfig {
            format: self.log_format.parse::<LoggerFormat>()?,
            level: self.log_level.clone(),
            ..Default::default()
        })
    }

    pub fn pass(&self) -> PassConfig {
        let lock_path = self.lock.clone().unwrap_or_else(|| {
            self.state
                .parent()
                .map(|p| p.join("autorun.lock"))
                .unwrap_or_else(|| PathBuf::from("autorun.lock"))
        });
        PassConfig {
            discovery: DiscoveryConfig {
                root: self.root.clone(),
                marker: self.marker.clone(),
                extension: self.extension.clone(),
                exclude: Some(self.output.clone()),
            },
            history_path: self.state.clone(),
            lock_path,
            dry_run: self.dry_run,
        }
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            output_root: self.output.clone(),
            output_extension: self.output_extension.clone(),
            working_dir: self.root.clone(),
            default_mem_mb: self.default_mem_mb,
            system_max_mem_mb: self.max_mem_mb,
            default_runtime_secs: self.default_runtime_secs,
            system_max_runtime_secs: self.max_runtime_secs,
            ..Default::default()
        }
    }

    pub fn engine(&self) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        if let Some(program) = &self.engine {
            cfg.program = program.clone();
            cfg.args = self.engine_args.clone();
        } else if !self.engine_args.is_empty() {
            cfg.args = self.engine_args.clone();
        }
        cfg
    }

    pub fn report_path(&self) -> PathBuf {
        self.report
            .clone()
            .unwrap_or_else(|| self.output.join("index.html"))
    }
}
