//! Session and launched-process records.

use std::collections::HashMap;

use core_api::{ProcessSummary, SessionSummary};
use core_config::SessionDefaults;
use tokio::process::Child;

/// Parameters for `create`. Defaults come from configuration; the caller
/// overrides individual fields per request.
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub window_manager: bool,
}

impl From<SessionDefaults> for CreateOptions {
    fn from(defaults: SessionDefaults) -> Self {
        Self {
            width: defaults.width,
            height: defaults.height,
            depth: defaults.depth,
            window_manager: defaults.window_manager,
        }
    }
}

/// A record for an application started inside a session. Retained after
/// exit for status reporting until the enclosing session is destroyed;
/// never re-keyed.
pub struct LaunchedProcess {
    pid: u32,
    command: String,
    child: Child,
}

impl LaunchedProcess {
    pub(crate) fn new(pid: u32, command: String, child: Child) -> Self {
        Self {
            pid,
            command,
            child,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Liveness is derived from the handle on every query, never stored.
    pub fn alive(&mut self) -> bool {
        core_runner::is_alive(&mut self.child)
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub(crate) fn summary(&mut self) -> ProcessSummary {
        ProcessSummary {
            pid: self.pid,
            command: self.command.clone(),
            alive: self.alive(),
        }
    }
}

/// A live isolated display environment: one framebuffer, an optional window
/// manager, and the applications launched into it. Geometry is immutable for
/// the session's lifetime.
pub struct Session {
    pub(crate) id: String,
    pub(crate) display: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: u32,
    pub(crate) framebuffer: Child,
    pub(crate) window_manager: Option<Child>,
    pub(crate) apps: HashMap<u32, LaunchedProcess>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display(&self) -> u32 {
        self.display
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn summary(&mut self) -> SessionSummary {
        let mut processes: Vec<ProcessSummary> =
            self.apps.values_mut().map(|p| p.summary()).collect();
        processes.sort_by_key(|p| p.pid);
        SessionSummary {
            id: self.id.clone(),
            display: self.display,
            width: self.width,
            height: self.height,
            processes,
        }
    }
}
