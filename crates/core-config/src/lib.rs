//! Configuration loading and parsing.
//!
//! Parses `vdesk.toml` (or an override path provided by the binary) into
//! session defaults and timing tunables. Unknown fields are ignored (TOML
//! deserialization tolerance) to allow forward evolution; a missing or
//! unparseable file falls back to defaults so the server always starts.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::warn;

/// Geometry and window-manager defaults applied when `create` omits them.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SessionDefaults {
    #[serde(default = "SessionDefaults::default_width")]
    pub width: u32,
    #[serde(default = "SessionDefaults::default_height")]
    pub height: u32,
    #[serde(default = "SessionDefaults::default_depth")]
    pub depth: u32,
    #[serde(default = "SessionDefaults::default_window_manager")]
    pub window_manager: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            depth: Self::default_depth(),
            window_manager: Self::default_window_manager(),
        }
    }
}

impl SessionDefaults {
    const fn default_width() -> u32 {
        1920
    }
    const fn default_height() -> u32 {
        1080
    }
    const fn default_depth() -> u32 {
        24
    }
    const fn default_window_manager() -> bool {
        true
    }
}

/// Timing tunables for subprocess supervision.
///
/// `exec_probe_ms` bounds how long `exec` watches a freshly spawned child
/// for an immediate failure before reporting success. 100 ms matches the
/// historical behavior; hosts with slow binary loading can raise it.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Timing {
    #[serde(default = "Timing::default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default = "Timing::default_readiness_deadline_ms")]
    pub readiness_deadline_ms: u64,
    #[serde(default = "Timing::default_exec_probe_ms")]
    pub exec_probe_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tool_timeout_ms: Self::default_tool_timeout_ms(),
            readiness_deadline_ms: Self::default_readiness_deadline_ms(),
            exec_probe_ms: Self::default_exec_probe_ms(),
        }
    }
}

impl Timing {
    const fn default_tool_timeout_ms() -> u64 {
        5000
    }
    const fn default_readiness_deadline_ms() -> u64 {
        5000
    }
    const fn default_exec_probe_ms() -> u64 {
        100
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
}

impl Config {
    pub fn session(&self) -> SessionDefaults {
        self.file.session
    }

    pub fn timing(&self) -> Timing {
        self.file.timing
    }
}

/// Best-effort config path following platform conventions: local working
/// directory `vdesk.toml` first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("vdesk.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vdesk").join("vdesk.toml");
    }
    PathBuf::from("vdesk.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config { file }),
            Err(err) => {
                warn!(target: "config", file = %path.display(), %err, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
