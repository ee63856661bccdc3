//! The registry: session table, display allocation, and lifecycle
//! operations.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use core_api::{Error, ExecResult, Result, SessionCreated, SessionDestroyed, SessionSummary};
use core_config::Timing;
use core_display::DisplayAllocator;
use core_runner as runner;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::session::{CreateOptions, LaunchedProcess, Session};

/// Poll cadence while waiting for the framebuffer to accept connections.
const READINESS_POLL: Duration = Duration::from_millis(100);
/// Extra settle time when readiness is inferred from the host lock file
/// because the display-info probe is not installed.
const LOCK_SETTLE: Duration = Duration::from_millis(300);
/// Time given to the window manager to come up before create returns.
const WM_SETTLE: Duration = Duration::from_millis(200);
/// Grace between SIGTERM and SIGKILL during teardown.
const APP_GRACE: Duration = Duration::from_millis(500);
const WM_GRACE: Duration = Duration::from_millis(500);
const FRAMEBUFFER_GRACE: Duration = Duration::from_secs(1);

/// In-memory table of live sessions keyed by identifier. All mutation flows
/// through the façade; display numbers of live sessions are pairwise
/// distinct and identifiers are distinct across the process lifetime.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    allocator: DisplayAllocator,
    next_id: u64,
    timing: Timing,
}

impl SessionRegistry {
    pub fn new(timing: Timing) -> Self {
        Self {
            sessions: HashMap::new(),
            allocator: DisplayAllocator::new(),
            next_id: 0,
            timing,
        }
    }

    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("s{}", self.next_id)
    }

    fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.tool_timeout_ms)
    }

    /// Create a new session: allocate a display, spawn the framebuffer, wait
    /// for readiness, optionally start the window manager, and register the
    /// result. On any failure every subprocess started here is terminated
    /// before the error returns; no partial state survives.
    pub async fn create(&mut self, opts: CreateOptions) -> Result<SessionCreated> {
        let display = self.allocator.allocate()?;
        let id = self.mint_id();
        let display_num = display;
        info!(
            target: "session.create",
            session = %id,
            display = display_num,
            width = opts.width,
            height = opts.height,
            depth = opts.depth,
            "framebuffer_spawn"
        );

        let screen = format!("{}x{}x{}", opts.width, opts.height, opts.depth);
        let xvfb_args = [
            format!(":{display}"),
            "-screen".into(),
            "0".into(),
            screen,
            "-ac".into(),
            "+extension".into(),
            "GLX".into(),
            "+render".into(),
            "-noreset".into(),
        ];
        let mut framebuffer = runner::spawn_detached("Xvfb", &xvfb_args, &[]).map_err(|err| {
            Error::InitFailed {
                display,
                reason: format!("failed to spawn Xvfb: {err}"),
            }
        })?;

        if let Err(err) = self.await_display_ready(display, &mut framebuffer).await {
            let display_num = display;
            warn!(target: "session.create", session = %id, display = display_num, %err, "framebuffer_not_ready");
            runner::terminate(&mut framebuffer, FRAMEBUFFER_GRACE).await;
            return Err(err);
        }

        let window_manager = if opts.window_manager {
            self.start_window_manager(&id, display).await
        } else {
            None
        };

        let session = Session {
            id: id.clone(),
            display,
            width: opts.width,
            height: opts.height,
            depth: opts.depth,
            framebuffer,
            window_manager,
            apps: HashMap::new(),
        };
        self.sessions.insert(id.clone(), session);
        let display_num = display;
        info!(target: "session.create", session = %id, display = display_num, "session_ready");

        Ok(SessionCreated {
            session_id: id,
            display,
            width: opts.width,
            height: opts.height,
        })
    }

    /// Poll the display-info tool until it exits zero, up to the configured
    /// deadline. Falls back to the host lock-file convention when the tool
    /// is not installed. A framebuffer that dies during the wait fails the
    /// create immediately instead of burning the rest of the deadline.
    async fn await_display_ready(
        &self,
        display: u32,
        framebuffer: &mut tokio::process::Child,
    ) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.timing.readiness_deadline_ms);
        let display_arg = format!(":{display}");

        loop {
            if let Ok(Some(status)) = framebuffer.try_wait() {
                return Err(Error::InitFailed {
                    display,
                    reason: format!("Xvfb exited during startup: {status}"),
                });
            }

            match runner::run_captured(
                "xdpyinfo",
                ["-display", display_arg.as_str()],
                &[],
                self.tool_timeout(),
            )
            .await
            {
                Ok(_) => return Ok(()),
                Err(Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                    if self.allocator.lock_path(display).exists() {
                        let display_num = display;
                        debug!(target: "session.create", display = display_num, "probe_missing_lock_file_present");
                        tokio::time::sleep(LOCK_SETTLE).await;
                        return Ok(());
                    }
                }
                Err(_) => {}
            }

            if Instant::now() >= deadline {
                return Err(Error::InitFailed {
                    display,
                    reason: "display did not become ready within deadline".into(),
                });
            }
            tokio::time::sleep(READINESS_POLL).await;
        }
    }

    /// Start the window manager for a fresh session. Its absence or failure
    /// is never fatal; the session continues bare.
    async fn start_window_manager(
        &self,
        id: &str,
        display: u32,
    ) -> Option<tokio::process::Child> {
        match runner::spawn_detached("openbox", std::iter::empty::<&str>(), &runner::display_env(display)) {
            Ok(child) => {
                tokio::time::sleep(WM_SETTLE).await;
                let display_num = display;
                debug!(target: "session.create", session = %id, display = display_num, "window_manager_started");
                Some(child)
            }
            Err(err) => {
                let display_num = display;
                warn!(target: "session.create", session = %id, display = display_num, %err, "window_manager_unavailable");
                None
            }
        }
    }

    /// Destroy a session: launched applications first, then the window
    /// manager, then the framebuffer. Every termination is best-effort. The
    /// session leaves the registry only after all signals were attempted.
    pub async fn destroy(&mut self, id: &str) -> Result<SessionDestroyed> {
        let session = self.sessions.get_mut(id).ok_or_else(|| Error::NotFound {
            id: id.to_string(),
        })?;

        info!(
            target: "session.registry",
            session = %id,
            display = session.display,
            apps = session.apps.len(),
            "destroy_begin"
        );
        for app in session.apps.values_mut() {
            runner::terminate(app.child_mut(), APP_GRACE).await;
        }
        if let Some(wm) = session.window_manager.as_mut() {
            runner::terminate(wm, WM_GRACE).await;
        }
        runner::terminate(&mut session.framebuffer, FRAMEBUFFER_GRACE).await;

        self.sessions.remove(id);
        info!(target: "session.registry", session = %id, "destroy_complete");
        Ok(SessionDestroyed {
            ok: true,
            destroyed: id.to_string(),
        })
    }

    /// Destroy every session, tolerating per-session failures. Idempotent;
    /// wired to signal handlers and the transport close path.
    pub async fn destroy_all(&mut self) {
        let ids = self.sorted_ids();
        if ids.is_empty() {
            return;
        }
        info!(target: "session.registry", count = ids.len(), "destroy_all");
        for id in ids {
            if let Err(err) = self.destroy(&id).await {
                warn!(target: "session.registry", session = %id, %err, "destroy_failed");
            }
        }
    }

    /// Resolve an optional identifier: the named session, or the sole live
    /// session when none was given.
    pub fn resolve_id(&self, id: Option<&str>) -> Result<String> {
        match id {
            Some(id) => {
                if self.sessions.contains_key(id) {
                    Ok(id.to_string())
                } else {
                    Err(Error::NotFound { id: id.to_string() })
                }
            }
            None => {
                let mut ids = self.sorted_ids();
                match ids.len() {
                    0 => Err(Error::NoSession),
                    1 => Ok(ids.remove(0)),
                    _ => Err(Error::Ambiguous { ids }),
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<&Session> {
        self.sessions.get(id).ok_or_else(|| Error::NotFound {
            id: id.to_string(),
        })
    }

    /// Snapshot every session with derived process liveness.
    pub fn list(&mut self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .values_mut()
            .map(|session| session.summary())
            .collect();
        summaries.sort_by_key(|s| id_ordinal(&s.id));
        summaries
    }

    /// Launch an application inside a session. The child is spawned detached
    /// with the session's display environment; an immediate failure within
    /// the configured probe window reports `LaunchFailed` and leaves no
    /// record. Later exits are tracked only through derived liveness.
    pub async fn exec(
        &mut self,
        id: &str,
        command: &str,
        args: &[String],
        extra_env: &[(String, String)],
    ) -> Result<ExecResult> {
        let probe = Duration::from_millis(self.timing.exec_probe_ms);
        let session = self.sessions.get_mut(id).ok_or_else(|| Error::NotFound {
            id: id.to_string(),
        })?;

        let command_line = if args.is_empty() {
            command.to_string()
        } else {
            format!("{command} {}", args.join(" "))
        };
        let envs = runner::launch_env(session.display, extra_env);
        let mut child = match runner::spawn_detached(command, args, &envs) {
            Ok(child) => child,
            Err(source) => {
                return Err(Error::LaunchFailed {
                    command: command_line,
                    source,
                });
            }
        };
        let pid = child.id().unwrap_or_default();

        tokio::time::sleep(probe).await;
        if let Ok(Some(status)) = child.try_wait()
            && !status.success()
        {
            return Err(Error::LaunchFailed {
                command: command_line,
                source: io::Error::other(format!("exited immediately with {status}")),
            });
        }

        info!(
            target: "session.exec",
            session = %id,
            pid,
            command = %command_line,
            "process_launched"
        );
        session
            .apps
            .insert(pid, LaunchedProcess::new(pid, command_line, child));
        Ok(ExecResult {
            pid,
            session_id: id.to_string(),
        })
    }

    fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort_by_key(|id| id_ordinal(id));
        ids
    }
}

fn id_ordinal(id: &str) -> u64 {
    id.strip_prefix('s')
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Timing::default())
    }

    /// A session whose framebuffer is a placeholder `sleep` so teardown has
    /// a real process to signal without needing an X stack.
    fn stub_session(id: &str, display: u32) -> Session {
        let framebuffer = runner::spawn_detached("sleep", ["300"], &[]).unwrap();
        Session {
            id: id.to_string(),
            display,
            width: 1280,
            height: 720,
            depth: 24,
            framebuffer,
            window_manager: None,
            apps: HashMap::new(),
        }
    }

    fn insert_stub(reg: &mut SessionRegistry, id: &str, display: u32) {
        reg.sessions.insert(id.to_string(), stub_session(id, display));
        reg.next_id += 1;
    }

    #[test]
    fn minted_ids_are_monotonic() {
        let mut reg = registry();
        assert_eq!(reg.mint_id(), "s1");
        assert_eq!(reg.mint_id(), "s2");
        assert_eq!(reg.mint_id(), "s3");
    }

    #[test]
    fn resolve_with_no_sessions_is_no_session() {
        let reg = registry();
        assert!(matches!(reg.resolve_id(None), Err(Error::NoSession)));
    }

    #[tokio::test]
    async fn resolve_defaults_to_sole_session() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        assert_eq!(reg.resolve_id(None).unwrap(), "s1");
        assert_eq!(reg.resolve_id(Some("s1")).unwrap(), "s1");
        reg.destroy_all().await;
    }

    #[tokio::test]
    async fn resolve_with_multiple_sessions_enumerates_ids() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        insert_stub(&mut reg, "s2", 100);
        match reg.resolve_id(None) {
            Err(Error::Ambiguous { ids }) => assert_eq!(ids, vec!["s1", "s2"]),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
        reg.destroy_all().await;
    }

    #[test]
    fn resolve_unknown_id_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.resolve_id(Some("s9")),
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn destroy_removes_session_and_second_destroy_fails() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let result = reg.destroy("s1").await.unwrap();
        assert!(result.ok);
        assert_eq!(result.destroyed, "s1");
        assert!(reg.list().is_empty());
        assert!(matches!(
            reg.destroy("s1").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn destroy_terminates_launched_processes() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let exec = reg.exec("s1", "sleep", &["300".into()], &[]).await.unwrap();
        assert!(exec.pid > 0);

        let listed = reg.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].processes.len(), 1);
        assert!(listed[0].processes[0].alive);

        reg.destroy("s1").await.unwrap();
        assert!(reg.list().is_empty());
    }

    #[tokio::test]
    async fn exec_missing_binary_fails_and_leaves_no_record() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let err = reg
            .exec("s1", "/bin/does-not-exist", &[], &[])
            .await
            .unwrap_err();
        match &err {
            Error::LaunchFailed { command, .. } => assert_eq!(command, "/bin/does-not-exist"),
            other => panic!("expected LaunchFailed, got {other:?}"),
        }
        assert!(reg.list()[0].processes.is_empty());
        reg.destroy_all().await;
    }

    #[tokio::test]
    async fn exec_immediate_nonzero_exit_fails_launch() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let err = reg.exec("s1", "false", &[], &[]).await.unwrap_err();
        assert!(matches!(err, Error::LaunchFailed { .. }), "got {err:?}");
        assert!(reg.list()[0].processes.is_empty());
        reg.destroy_all().await;
    }

    #[tokio::test]
    async fn exec_quick_successful_exit_is_recorded_not_alive() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let exec = reg.exec("s1", "true", &[], &[]).await.unwrap();
        let listed = reg.list();
        assert_eq!(listed[0].processes.len(), 1);
        assert_eq!(listed[0].processes[0].pid, exec.pid);
        assert!(!listed[0].processes[0].alive);
        reg.destroy_all().await;
    }

    #[tokio::test]
    async fn destroy_all_empties_registry_and_is_idempotent() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        insert_stub(&mut reg, "s2", 100);
        reg.destroy_all().await;
        assert!(reg.list().is_empty());
        reg.destroy_all().await;
        assert!(reg.list().is_empty());
    }

    #[tokio::test]
    async fn list_reports_geometry() {
        let mut reg = registry();
        insert_stub(&mut reg, "s1", 99);
        let listed = reg.list();
        assert_eq!(listed[0].display, 99);
        assert_eq!(listed[0].width, 1280);
        assert_eq!(listed[0].height, 720);
        reg.destroy_all().await;
    }
}
