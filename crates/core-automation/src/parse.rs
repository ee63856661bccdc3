//! Parsers for input-automation tool output.

use std::sync::OnceLock;

use regex::Regex;

static LOCATION_RE: OnceLock<Regex> = OnceLock::new();

fn location_re() -> &'static Regex {
    LOCATION_RE.get_or_init(|| {
        Regex::new(r"([a-z]+):(-?\d+)").expect("mouse location pattern is valid")
    })
}

/// Parse `getmouselocation` output of the form
/// `x:512 y:384 screen:0 window:16777250`. Absent fields default to 0.
pub fn parse_mouse_location(out: &str) -> (i64, i64) {
    let mut x = 0;
    let mut y = 0;
    for cap in location_re().captures_iter(out) {
        let value = cap[2].parse().unwrap_or(0);
        match &cap[1] {
            "x" => x = value,
            "y" => y = value,
            _ => {}
        }
    }
    (x, y)
}

/// Parse `getwindowgeometry --shell` output: `KEY=value` lines carrying at
/// least `X`, `Y`, `WIDTH`, `HEIGHT`. Returns `None` when any required field
/// is missing or unparseable, which callers treat as the window having gone
/// away.
pub fn parse_geometry(out: &str) -> Option<(i32, i32, u32, u32)> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;
    for line in out.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => x = value.parse().ok(),
            "Y" => y = value.parse().ok(),
            "WIDTH" => width = value.parse().ok(),
            "HEIGHT" => height = value.parse().ok(),
            _ => {}
        }
    }
    Some((x?, y?, width?, height?))
}
