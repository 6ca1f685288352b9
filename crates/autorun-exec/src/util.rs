use std::time::Duration;

use tokio::process::Child;

/// How long the process group gets to exit after SIGTERM before it is killed outright.
const TERM_GRACE: Duration = Duration::from_secs(2);
#[cfg(target_family = "unix")]
const GROUP_POLL: Duration = Duration::from_millis(50);

/// Stop `child` and everything left in its process group.
///
/// `group` is the group id the child was spawned into (its own pid); a reaped child still leaves
/// background descendants in the group, which would otherwise keep the output pipes open.
#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child, group: Option<u32>) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use tracing::debug;

    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw) else {
        return child.kill().await;
    };

    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        debug!(target: "autorun.exec.proc", pgid = %pgid, error = %e, "SIGTERM to process group failed");
    }

    let deadline = tokio::time::Instant::now() + TERM_GRACE;
    let _ = tokio::time::timeout_at(deadline, child.wait()).await;
    while killpg(pgid, None).is_ok() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(GROUP_POLL).await;
    }

    let _ = killpg(pgid, Signal::SIGKILL);
    // Already reaped when only descendants were left.
    let _ = child.kill().await;
    Ok(())
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child, _group: Option<u32>) -> std::io::Result<()> {
    child.kill().await
}
