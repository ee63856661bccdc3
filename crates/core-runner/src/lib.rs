//! Uniform subprocess invocation for external display tooling.
//!
//! Two shapes cover every external tool the session manager touches: short
//! commands (input synthesis, window queries, capture) run to completion
//! under a hard timeout with stdout captured, and long-lived commands
//! (framebuffer, window manager, launched applications) are spawned detached
//! with their streams discarded and their handles retained for later
//! termination.
//!
//! Argument passing is list-based and shell-free throughout: every argument,
//! including user-supplied text to be typed, is delivered as its own argv
//! element. Nothing in this crate ever builds a shell command string.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use core_api::{Error, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Environment overlay selecting a session's display.
pub fn display_env(display: u32) -> Vec<(String, String)> {
    vec![("DISPLAY".into(), format!(":{display}"))]
}

/// Environment overlay for launched applications: display selector, Qt
/// platform hint, then caller entries (highest precedence last).
pub fn launch_env(display: u32, extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut envs = display_env(display);
    envs.push(("QT_QPA_PLATFORM".into(), "xcb".into()));
    envs.extend(extra.iter().cloned());
    envs
}

/// Run a short external command to completion, capturing stdout.
///
/// Nonzero exit yields `ToolFailed` with trimmed stderr; exceeding `timeout`
/// kills the child and yields `Timeout`. A spawn failure (missing binary)
/// surfaces as `Io`.
pub async fn run_captured<I, S>(
    tool: &str,
    args: I,
    envs: &[(String, String)],
    timeout: Duration,
) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(tool);
    cmd.args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let timeout_ms = timeout.as_millis() as u64;
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(target: "runner", tool, timeout_ms, "tool_timeout");
            return Err(Error::Timeout {
                tool: tool.to_string(),
                timeout_ms,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(target: "runner", tool, status = ?output.status.code(), "tool_nonzero_exit");
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Spawn a long-lived command detached: streams discarded, not waited on.
/// The returned handle is the sole means of later termination.
pub fn spawn_detached<I, S>(
    program: &str,
    args: I,
    envs: &[(String, String)],
) -> std::io::Result<Child>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Derived liveness: a process is alive iff it has neither been killed nor
/// exited. Never stored; always recomputed from the handle.
pub fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

/// Best-effort termination: polite SIGTERM first, escalating to SIGKILL if
/// the child is still running after `grace`. Signalling an already-dead
/// process is tolerated silently.
pub async fn terminate(child: &mut Child, grace: Duration) {
    match child.try_wait() {
        Ok(Some(_)) | Err(_) => return,
        Ok(None) => {}
    }
    if let Some(pid) = child.id() {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}
