//! Session registry and lifecycle: the in-memory table of live display
//! sessions, the processes each one owns, and the create/destroy/exec
//! operations that keep operating-system resources and registry state in
//! lockstep.
//!
//! Ownership model: a session owns its framebuffer subprocess, its optional
//! window-manager subprocess, every launched application, and its display
//! number. Destroy releases all four; nothing outside this crate can mutate
//! a session's process table.

mod registry;
mod session;

pub use registry::SessionRegistry;
pub use session::{CreateOptions, LaunchedProcess, Session};
