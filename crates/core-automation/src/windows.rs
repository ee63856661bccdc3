//! Window search, geometry lookup, and bounded waiting.

use std::time::Duration;

use core_api::WindowInfo;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{Automation, parse};

/// Poll cadence for `wait_for_window`.
const WAIT_POLL: Duration = Duration::from_millis(250);

impl Automation {
    /// Enumerate windows on the display, optionally filtered by a title
    /// pattern. Windows that vanish between the search and the geometry or
    /// name lookup are skipped; a failed search yields an empty list. This
    /// operation never raises.
    pub async fn find_windows(&self, display: u32, pattern: Option<&str>) -> Vec<WindowInfo> {
        let search = match pattern {
            Some(pattern) => {
                self.xdotool(
                    display,
                    vec!["search".into(), "--name".into(), pattern.into()],
                )
                .await
            }
            // The empty pattern matches everything; --onlyvisible filters
            // out window-manager internals.
            None => {
                self.xdotool(
                    display,
                    vec![
                        "search".into(),
                        "--onlyvisible".into(),
                        "--name".into(),
                        String::new(),
                    ],
                )
                .await
            }
        };
        let out = match search {
            Ok(out) => out,
            Err(err) => {
                let display_num = display;
                debug!(target: "automation.windows", display = display_num, %err, "window_search_failed");
                return Vec::new();
            }
        };

        let mut windows = Vec::new();
        for id in out.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.window_info(display, id).await {
                Some(info) => windows.push(info),
                None => {
                    let display_num = display;
                    trace!(target: "automation.windows", display = display_num, window = id, "window_vanished");
                }
            }
        }
        windows
    }

    async fn window_info(&self, display: u32, id: &str) -> Option<WindowInfo> {
        let geometry = self
            .xdotool(
                display,
                vec!["getwindowgeometry".into(), "--shell".into(), id.into()],
            )
            .await
            .ok()?;
        let (x, y, width, height) = parse::parse_geometry(&geometry)?;
        let name = self
            .xdotool(display, vec!["getwindowname".into(), id.into()])
            .await
            .ok()?;
        Some(WindowInfo {
            window_id: id.to_string(),
            name: name.trim_end_matches('\n').to_string(),
            x,
            y,
            width,
            height,
        })
    }

    /// Poll for a window matching `pattern` every 250 ms until `timeout_ms`
    /// elapses. Always polls at least once, so a zero timeout still observes
    /// an already-present window.
    pub async fn wait_for_window(
        &self,
        display: u32,
        pattern: &str,
        timeout_ms: u64,
    ) -> Option<WindowInfo> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let mut found = self.find_windows(display, Some(pattern)).await;
            if !found.is_empty() {
                return Some(found.remove(0));
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}
