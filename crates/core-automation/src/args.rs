//! Argument-vector builders for the input-automation tool.
//!
//! Builders are pure so the injection-safety contract is testable: user text
//! must arrive as a single unchanged argv element, behind a `--` sentinel
//! where the tool accepts one.

use core_api::{Error, Result};

/// Per-character delay for synthesized typing, in milliseconds.
const TYPE_DELAY_MS: &str = "12";
/// Delay between the two presses of a double click.
const DOUBLE_CLICK_DELAY_MS: &str = "50";
/// Delay between wheel clicks while scrolling.
const SCROLL_DELAY_MS: &str = "10";
/// Scroll units represented by one wheel click.
const SCROLL_UNITS_PER_CLICK: f64 = 30.0;
/// Scroll amount assumed when the caller supplied none.
const DEFAULT_SCROLL_AMOUNT: f64 = 300.0;

pub(crate) fn key_args(key: &str) -> Vec<String> {
    vec!["key".into(), "--clearmodifiers".into(), key.into()]
}

pub(crate) fn type_args(text: &str) -> Vec<String> {
    vec![
        "type".into(),
        "--clearmodifiers".into(),
        "--delay".into(),
        TYPE_DELAY_MS.into(),
        "--".into(),
        text.into(),
    ]
}

pub(crate) fn move_args(x: i64, y: i64) -> Vec<String> {
    vec![
        "mousemove".into(),
        "--sync".into(),
        x.to_string(),
        y.to_string(),
    ]
}

pub(crate) fn click_args(button: u8) -> Vec<String> {
    vec!["click".into(), button.to_string()]
}

pub(crate) fn double_click_args() -> Vec<String> {
    vec![
        "click".into(),
        "--repeat".into(),
        "2".into(),
        "--delay".into(),
        DOUBLE_CLICK_DELAY_MS.into(),
        "1".into(),
    ]
}

pub(crate) fn drag_args(x: i64, y: i64) -> Vec<String> {
    vec![
        "mousedown".into(),
        "1".into(),
        "mousemove".into(),
        "--sync".into(),
        x.to_string(),
        y.to_string(),
        "mouseup".into(),
        "1".into(),
    ]
}

pub(crate) fn scroll_args(direction: &str, amount: Option<f64>) -> Result<Vec<String>> {
    let button = match direction {
        "up" => 4u8,
        "down" => 5,
        "left" => 6,
        "right" => 7,
        other => {
            return Err(Error::invalid_argument(format!(
                "unknown scroll direction: {other}"
            )));
        }
    };
    let amount = amount.unwrap_or(DEFAULT_SCROLL_AMOUNT);
    let clicks = ((amount / SCROLL_UNITS_PER_CLICK).round() as i64).max(1);
    Ok(vec![
        "click".into(),
        "--repeat".into(),
        clicks.to_string(),
        "--delay".into(),
        SCROLL_DELAY_MS.into(),
        button.to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_text_is_one_argv_element_behind_sentinel() {
        let hostile = "rm -rf /; $(reboot) | tee \"x\" 'y'\nnext line";
        let argv = type_args(hostile);
        let sentinel = argv.iter().position(|a| a == "--").unwrap();
        assert_eq!(argv.len(), sentinel + 2, "text must be the sole trailing element");
        assert_eq!(argv[sentinel + 1], hostile);
    }

    #[test]
    fn key_combo_passes_through_verbatim() {
        let argv = key_args("ctrl+shift+t");
        assert_eq!(argv, vec!["key", "--clearmodifiers", "ctrl+shift+t"]);
    }

    #[test]
    fn move_is_synced() {
        assert_eq!(move_args(960, 540), vec!["mousemove", "--sync", "960", "540"]);
    }

    #[test]
    fn double_click_is_two_presses_fifty_ms_apart() {
        assert_eq!(
            double_click_args(),
            vec!["click", "--repeat", "2", "--delay", "50", "1"]
        );
    }

    #[test]
    fn drag_chains_press_move_release() {
        assert_eq!(
            drag_args(10, 20),
            vec!["mousedown", "1", "mousemove", "--sync", "10", "20", "mouseup", "1"]
        );
    }

    #[test]
    fn scroll_direction_maps_to_wheel_buttons() {
        for (direction, button) in [("up", "4"), ("down", "5"), ("left", "6"), ("right", "7")] {
            let argv = scroll_args(direction, Some(300.0)).unwrap();
            assert_eq!(argv.last().unwrap(), button, "direction {direction}");
        }
    }

    #[test]
    fn scroll_click_count_rounds_with_floor_of_one() {
        // 300 units -> 10 clicks, 44 -> 1 (round(1.47)), 10 -> 1 (max with 1).
        let clicks = |amount: f64| scroll_args("down", Some(amount)).unwrap()[2].clone();
        assert_eq!(clicks(300.0), "10");
        assert_eq!(clicks(44.0), "1");
        assert_eq!(clicks(46.0), "2");
        assert_eq!(clicks(10.0), "1");
        assert_eq!(clicks(0.0), "1");
    }

    #[test]
    fn scroll_amount_defaults_when_absent() {
        let argv = scroll_args("up", None).unwrap();
        assert_eq!(argv[2], "10");
    }

    #[test]
    fn unknown_scroll_direction_is_invalid_argument() {
        let err = scroll_args("sideways", Some(100.0)).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
