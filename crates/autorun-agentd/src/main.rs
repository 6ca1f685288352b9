use std::sync::Arc;

use anyhow::Context;
use autorun_core::{CoreError, NotebookExtractor, Pass, SandboxedExecutor, clock};
use autorun_exec::ProcessEngine;
use autorun_observe::logger_init;
use autorun_report::HtmlReporter;
use clap::Parser;
use tracing::{info, warn};

mod args;
use args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let args = Args::parse().anchored_at(&cwd);

    // 1) Logger
    let logger = args.logger().context("invalid logger configuration")?;
    logger_init(&logger).context("failed to initialize logger")?;

    // 2) Engine + executor
    let engine = ProcessEngine::new(args.engine(), args.isolation.into())
        .with_systemd_run(args.systemd_run.clone());
    let executor = SandboxedExecutor::new(args.executor(), Arc::new(engine));

    // 3) Pass
    let reporter = HtmlReporter::new(args.report_path())
        .with_title(args.title.clone())
        .with_artifact_extension(args.output_extension.clone());
    let pass = Pass::new(args.pass(), Arc::new(NotebookExtractor::new()), executor)
        .with_reporter(Arc::new(reporter));

    let now = args.now.unwrap_or_else(clock::now_epoch);
    info!(
        root = %args.root.display(),
        isolation = ?args.isolation,
        now,
        dry_run = args.dry_run,
        "starting pass"
    );

    // 4) Run once; the timer brings us back.
    match pass.run(now).await {
        Ok(report) => {
            if report.summary.errored > 0 {
                warn!(errored = report.summary.errored, "some tasks were skipped; see errors above");
            }
            Ok(())
        }
        Err(CoreError::Busy(path)) => {
            warn!(lock = %path.display(), "previous pass still running; skipping this tick");
            Ok(())
        }
        Err(e) => Err(e).context("pass aborted"),
    }
}
