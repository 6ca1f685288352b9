//! One tick: load history, discover, evaluate, execute, reconcile, persist, render.
use std::{path::PathBuf, sync::Arc};

use autorun_model::{History, Outcome, RunRecord};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    Task,
    clock::format_timestamp,
    discovery::{DiscoveryConfig, discover},
    error::{CoreError, TaskError},
    executor::SandboxedExecutor,
    extract::Extractor,
    history::{HistoryStore, reconcile},
    lock::PassLock,
    trigger::{is_due_every, period_of},
};

/// Renders the history into something humans look at.
pub trait Reporter: Send + Sync {
    fn publish(&self, history: &History, generated_at: i64) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct PassConfig {
    pub discovery: DiscoveryConfig,
    pub history_path: PathBuf,
    pub lock_path: PathBuf,
    /// Evaluate triggers but do not execute, persist or render.
    pub dry_run: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            history_path: PathBuf::from("autorun-history.json"),
            lock_path: PathBuf::from("autorun.lock"),
            dry_run: false,
        }
    }
}

/// Counters of one pass, for the closing log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub discovered: usize,
    pub unscheduled: usize,
    pub not_due: usize,
    /// Due but held back by a dry run.
    pub would_run: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errored: usize,
}

impl PassSummary {
    pub fn executed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// What a finished pass produced.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub history: History,
    pub summary: PassSummary,
}

enum Step {
    /// No trigger metadata.
    Unscheduled,
    /// Scheduled but not due this tick; previous record carried forward.
    NotDue(RunRecord),
    /// Due, but the pass is a dry run; previous record carried forward.
    WouldRun(RunRecord),
    /// Executed this tick.
    Ran(RunRecord),
}

pub struct Pass {
    cfg: PassConfig,
    store: HistoryStore,
    extractor: Arc<dyn Extractor>,
    executor: SandboxedExecutor,
    reporter: Option<Arc<dyn Reporter>>,
}

impl Pass {
    pub fn new(cfg: PassConfig, extractor: Arc<dyn Extractor>, executor: SandboxedExecutor) -> Self {
        let store = HistoryStore::new(cfg.history_path.clone());
        Self {
            cfg,
            store,
            extractor,
            executor,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Run one pass as of `now` (epoch seconds).
    ///
    /// Only discovery, locking and persisting can fail the pass; every task-level problem is contained.
    #[instrument(level = "debug", skip(self))]
    pub async fn run(&self, now: i64) -> Result<PassReport, CoreError> {
        let _lock = PassLock::try_acquire(&self.cfg.lock_path)?;

        let previous = self.store.load();
        let tasks = discover(&self.cfg.discovery)?;

        let mut summary = PassSummary {
            discovered: tasks.len(),
            ..Default::default()
        };
        let mut current = History::new();

        for task in &tasks {
            match self.handle(task, &previous, now).await {
                Ok(Step::Unscheduled) => {
                    summary.unscheduled += 1;
                    current.insert(task.key.clone(), RunRecord::not_run());
                }
                Ok(Step::NotDue(record)) => {
                    summary.not_due += 1;
                    current.insert(task.key.clone(), record);
                }
                Ok(Step::WouldRun(record)) => {
                    summary.would_run += 1;
                    current.insert(task.key.clone(), record);
                }
                Ok(Step::Ran(record)) => {
                    match record.outcome {
                        Outcome::Success => summary.succeeded += 1,
                        _ => summary.failed += 1,
                    }
                    current.insert(task.key.clone(), record);
                }
                Err(e) => {
                    summary.errored += 1;
                    error!(target: "autorun.core.pass", task = %task.key, error = %e, "task skipped after unexpected error");
                }
            }
        }

        let history = reconcile(current, previous);

        if self.cfg.dry_run {
            info!(
                target: "autorun.core.pass",
                discovered = summary.discovered,
                would_run = summary.would_run,
                not_due = summary.not_due,
                unscheduled = summary.unscheduled,
                errored = summary.errored,
                "dry run finished; history untouched"
            );
            return Ok(PassReport { history, summary });
        }

        self.store.save(&history)?;

        if let Some(reporter) = &self.reporter
            && let Err(e) = reporter.publish(&history, now)
        {
            warn!(target: "autorun.core.pass", error = %e, "report not rendered");
        }

        info!(
            target: "autorun.core.pass",
            discovered = summary.discovered,
            executed = summary.executed(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            unscheduled = summary.unscheduled,
            not_due = summary.not_due,
            errored = summary.errored,
            "pass finished"
        );
        Ok(PassReport { history, summary })
    }

    async fn handle(&self, task: &Task, previous: &History, now: i64) -> Result<Step, TaskError> {
        let Some(config) = self.extractor.extract(&task.path)? else {
            return Ok(Step::Unscheduled);
        };

        let carried = || {
            previous
                .get(&task.key)
                .cloned()
                .unwrap_or_else(RunRecord::not_run)
        };

        let period = match period_of(&config) {
            Ok(period) => period,
            Err(e) => {
                debug!(target: "autorun.core.pass", task = %task.key, reason = %e, "trigger never fires");
                return Ok(Step::NotDue(carried()));
            }
        };
        if !is_due_every(period, now) {
            return Ok(Step::NotDue(carried()));
        }

        if self.cfg.dry_run {
            info!(target: "autorun.core.pass", task = %task.key, period, "due; dry run, not executing");
            return Ok(Step::WouldRun(carried()));
        }

        let run = self.executor.run(task, &config).await?;
        Ok(Step::Ran(RunRecord::new(
            format_timestamp(now),
            run.outcome,
            run.elapsed,
        )))
    }
}
