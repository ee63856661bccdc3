//! Input synthesis and window queries against a session's display.
//!
//! Everything here shells out to the input-automation tool (`xdotool`) with
//! the session's display selector in the environment. Coordinates arriving
//! at this layer are display-space integers already scaled and clamped by
//! the caller; no coordinate math happens here.

mod args;
mod parse;
mod windows;

use std::time::Duration;

use core_api::Result;
use core_runner as runner;

pub use parse::{parse_geometry, parse_mouse_location};

/// Driver for the input-automation tool. Cheap to construct; holds only the
/// short-command timeout.
#[derive(Debug, Clone, Copy)]
pub struct Automation {
    timeout: Duration,
}

impl Automation {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn xdotool(&self, display: u32, tool_args: Vec<String>) -> Result<String> {
        runner::run_captured(
            "xdotool",
            &tool_args,
            &runner::display_env(display),
            self.timeout,
        )
        .await
    }

    /// Press a single key or `+`-joined combo with modifier state cleared.
    pub async fn send_key(&self, display: u32, key: &str) -> Result<()> {
        self.xdotool(display, args::key_args(key)).await.map(drop)
    }

    /// Type literal text at 12 ms per character. The text travels as one
    /// argv element behind the `--` sentinel; it is never interpreted.
    pub async fn send_type(&self, display: u32, text: &str) -> Result<()> {
        self.xdotool(display, args::type_args(text)).await.map(drop)
    }

    /// Move the pointer and wait for the server to acknowledge.
    pub async fn mouse_move(&self, display: u32, x: i64, y: i64) -> Result<()> {
        self.xdotool(display, args::move_args(x, y)).await.map(drop)
    }

    /// Click button `1..=3`, optionally moving first.
    pub async fn mouse_click(
        &self,
        display: u32,
        button: u8,
        position: Option<(i64, i64)>,
    ) -> Result<()> {
        if let Some((x, y)) = position {
            self.mouse_move(display, x, y).await?;
        }
        self.xdotool(display, args::click_args(button))
            .await
            .map(drop)
    }

    /// Two left presses 50 ms apart, optionally moving first.
    pub async fn mouse_double_click(
        &self,
        display: u32,
        position: Option<(i64, i64)>,
    ) -> Result<()> {
        if let Some((x, y)) = position {
            self.mouse_move(display, x, y).await?;
        }
        self.xdotool(display, args::double_click_args())
            .await
            .map(drop)
    }

    /// Press, drag from the current pointer position to `(x, y)`, release.
    pub async fn mouse_drag(&self, display: u32, x: i64, y: i64) -> Result<()> {
        self.xdotool(display, args::drag_args(x, y)).await.map(drop)
    }

    /// Scroll by synthesizing wheel-button clicks. `amount` defaults to 300
    /// when the caller could not parse one; one click per 30 units, at
    /// least one.
    pub async fn mouse_scroll(
        &self,
        display: u32,
        direction: &str,
        amount: Option<f64>,
        position: Option<(i64, i64)>,
    ) -> Result<()> {
        let scroll = args::scroll_args(direction, amount)?;
        if let Some((x, y)) = position {
            self.mouse_move(display, x, y).await?;
        }
        self.xdotool(display, scroll).await.map(drop)
    }

    /// Current pointer position in display space. Fields absent from the
    /// tool's report default to 0.
    pub async fn cursor_position(&self, display: u32) -> Result<(i64, i64)> {
        let out = self
            .xdotool(display, vec!["getmouselocation".into()])
            .await?;
        Ok(parse::parse_mouse_location(&out))
    }
}
