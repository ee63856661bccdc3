//! Shared vocabulary for the vdesk control plane: the error taxonomy every
//! layer propagates and the structured result payloads the RPC shell
//! serializes back to clients.
//!
//! This crate is a leaf on purpose. Higher layers (runner, registry, façade)
//! agree on these types so errors surface verbatim at the protocol boundary
//! instead of being re-wrapped per crate.

use serde::Serialize;
use thiserror::Error;

/// Unified error taxonomy for session-manager operations.
///
/// Kinds map one-to-one onto protocol error codes in the RPC shell; the
/// façade never collapses distinct kinds into a generic failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown session identifier.
    #[error("unknown session: {id}")]
    NotFound { id: String },

    /// No session exists and none was named.
    #[error("no sessions exist; create one first")]
    NoSession,

    /// More than one session exists and none was named. The message
    /// enumerates the known identifiers so clients can retry explicitly.
    #[error("multiple sessions exist, specify one of: {}", ids.join(", "))]
    Ambiguous { ids: Vec<String> },

    /// The framebuffer did not become ready within the deadline.
    #[error("display :{display} failed to initialize: {reason}")]
    InitFailed { display: u32, reason: String },

    /// A launched application reported an immediate spawn failure.
    #[error("failed to launch `{command}`: {source}")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool exited nonzero.
    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    /// A short external tool call exceeded its hard timeout.
    #[error("{tool} timed out after {timeout_ms} ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// Screen capture produced no file, an empty file, or undecodable bytes.
    #[error("screen capture failed: {reason}")]
    CaptureFailed { reason: String },

    /// A request carried a bad scroll direction, a missing required field,
    /// or an unknown action name.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn capture_failed(reason: impl Into<String>) -> Self {
        Error::CaptureFailed {
            reason: reason.into(),
        }
    }

    /// Stable kind label used in logs and protocol error data.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::NoSession => "no_session",
            Error::Ambiguous { .. } => "ambiguous",
            Error::InitFailed { .. } => "init_failed",
            Error::LaunchFailed { .. } => "launch_failed",
            Error::ToolFailed { .. } => "tool_failed",
            Error::Timeout { .. } => "timeout",
            Error::CaptureFailed { .. } => "capture_failed",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result payload for `create`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub display: u32,
    pub width: u32,
    pub height: u32,
}

/// Result payload for `destroy`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDestroyed {
    pub ok: bool,
    pub destroyed: String,
}

/// One launched application inside a session, as reported by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub pid: u32,
    pub command: String,
    pub alive: bool,
}

/// One live session, as reported by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub display: u32,
    pub width: u32,
    pub height: u32,
    pub processes: Vec<ProcessSummary>,
}

/// Result payload for `exec`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub pid: u32,
    pub session_id: String,
}

/// A screenshot in API image space. `data` is base64 PNG; the reported
/// dimensions are the post-rescale pixel size clients must use for
/// coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct Screenshot {
    pub display_width_px: u32,
    pub display_height_px: u32,
    pub media_type: &'static str,
    pub data: String,
}

/// Snapshot of a window observed on a session's display. Coordinates and
/// dimensions are display space. Not retained: the window may be gone by the
/// time the caller acts on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub window_id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Result payload for `waitForWindow`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WindowWait {
    Found {
        found: bool,
        #[serde(flatten)]
        window: WindowInfo,
    },
    TimedOut {
        found: bool,
        title: String,
        timeout_ms: u64,
    },
}

impl WindowWait {
    pub fn found(window: WindowInfo) -> Self {
        WindowWait::Found {
            found: true,
            window,
        }
    }

    pub fn timed_out(title: impl Into<String>, timeout_ms: u64) -> Self {
        WindowWait::TimedOut {
            found: false,
            title: title.into(),
            timeout_ms,
        }
    }
}

/// Cursor position in API image space.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CursorPosition {
    pub x: i64,
    pub y: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_enumerates_ids() {
        let err = Error::Ambiguous {
            ids: vec!["s1".into(), "s2".into(), "s3".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("s1, s2, s3"), "ids missing from: {msg}");
        assert_eq!(err.kind(), "ambiguous");
    }

    #[test]
    fn launch_failed_preserves_command_and_cause() {
        let err = Error::LaunchFailed {
            command: "/bin/does-not-exist -x".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.contains("/bin/does-not-exist -x"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn window_info_serializes_camel_case() {
        let info = WindowInfo {
            window_id: "0x1a".into(),
            name: "xmessage".into(),
            x: 100,
            y: 100,
            width: 400,
            height: 200,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["windowId"], "0x1a");
        assert_eq!(json["width"], 400);
        assert!(json.get("window_id").is_none());
    }

    #[test]
    fn window_wait_found_flattens_window_fields() {
        let wait = WindowWait::found(WindowInfo {
            window_id: "0x2b".into(),
            name: "editor".into(),
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        });
        let json = serde_json::to_value(&wait).unwrap();
        assert_eq!(json["found"], true);
        assert_eq!(json["windowId"], "0x2b");

        let miss = WindowWait::timed_out("editor", 5000);
        let json = serde_json::to_value(&miss).unwrap();
        assert_eq!(json["found"], false);
        assert_eq!(json["timeout_ms"], 5000);
    }
}
