//! The single-scalar scale model shared by capture and coordinate mapping.

/// Longest edge the API image may have, in pixels.
pub const MAX_LONG_EDGE: u32 = 1568;
/// Largest pixel count the API image may have.
pub const MAX_PIXELS: f64 = 1.15 * 1024.0 * 1024.0;

/// Scale factor `s ≤ 1` applied to both axes of a `width × height` display
/// when producing the API image. `1.0` means the image ships at native
/// resolution.
pub fn scale_factor(width: u32, height: u32) -> f64 {
    let long_edge = width.max(height) as f64;
    let pixels = width as f64 * height as f64;
    let long_edge_scale = if long_edge > MAX_LONG_EDGE as f64 {
        MAX_LONG_EDGE as f64 / long_edge
    } else {
        1.0
    };
    let pixel_scale = if pixels > MAX_PIXELS {
        (MAX_PIXELS / pixels).sqrt()
    } else {
        1.0
    };
    long_edge_scale.min(pixel_scale)
}

/// Translate an API-image coordinate to display space: multiply by `1/s`
/// and round.
pub fn api_to_display(value: i64, scale: f64) -> i64 {
    (value as f64 / scale).round() as i64
}

/// Translate a display-space coordinate to API image space: multiply by `s`
/// and round.
pub fn display_to_api(value: i64, scale: f64) -> i64 {
    (value as f64 * scale).round() as i64
}

/// Clamp a display-space point into the framebuffer's pixel grid.
pub fn clamp_to_display(x: i64, y: i64, width: u32, height: u32) -> (i64, i64) {
    (
        x.clamp(0, width.saturating_sub(1) as i64),
        y.clamp(0, height.saturating_sub(1) as i64),
    )
}
