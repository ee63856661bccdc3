//! Screen capture and the display-space / API-image-space scale model.
//!
//! A capture grabs one PNG frame of a session's display at native
//! resolution, then may downscale it by a single scalar `s ≤ 1` on both
//! axes before returning it to the client. The same scalar drives every
//! coordinate translation: client coordinates are multiplied by `1/s`
//! before input synthesis, and cursor positions divided by `1/s` on the way
//! back, so clients only ever reason in the image they last saw.

mod scale;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use core_api::{Error, Result, Screenshot};
use core_runner as runner;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use tracing::debug;

pub use scale::{api_to_display, clamp_to_display, display_to_api, scale_factor};

/// Grabs frames from a session's display via the screen-capture tool.
#[derive(Debug, Clone, Copy)]
pub struct Capturer {
    timeout: Duration,
}

impl Capturer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Capture one frame of display `:N` at its native `width × height`,
    /// apply the rescale policy, and return base64 PNG bytes plus the
    /// dimensions the client must use for coordinates.
    pub async fn screenshot(&self, display: u32, width: u32, height: u32) -> Result<Screenshot> {
        let frame = tempfile::Builder::new()
            .prefix("vdesk-frame-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| Error::capture_failed(format!("temp file: {err}")))?
            .into_temp_path();
        let Some(frame_path) = frame.to_str().map(str::to_owned) else {
            return Err(Error::capture_failed("temp path is not valid UTF-8"));
        };

        let grab_args = [
            "-f".to_string(),
            "x11grab".into(),
            "-video_size".into(),
            format!("{width}x{height}"),
            "-i".into(),
            format!(":{display}"),
            "-vframes".into(),
            "1".into(),
            "-y".into(),
            frame_path,
        ];
        runner::run_captured("ffmpeg", &grab_args, &runner::display_env(display), self.timeout)
            .await
            .map_err(|err| Error::capture_failed(err.to_string()))?;

        let raw = std::fs::read(&frame)
            .map_err(|err| Error::capture_failed(format!("reading frame: {err}")))?;
        if raw.is_empty() {
            return Err(Error::capture_failed("capture produced an empty file"));
        }
        // `frame` unlinks on drop; a failed unlink is tolerated.

        let (bytes, out_width, out_height) = rescale_png(raw, width, height)?;
        let display_num = display;
        debug!(
            target: "capture",
            display = display_num,
            width,
            height,
            out_width,
            out_height,
            bytes = bytes.len(),
            "frame_captured"
        );
        Ok(Screenshot {
            display_width_px: out_width,
            display_height_px: out_height,
            media_type: "image/png",
            data: BASE64.encode(bytes),
        })
    }
}

/// Apply the rescale policy: if the scale factor for `width × height` is
/// below one, decode, resize to `floor(w·s) × floor(h·s)`, and re-encode
/// with fast compression; otherwise pass the raw bytes through.
fn rescale_png(raw: Vec<u8>, width: u32, height: u32) -> Result<(Vec<u8>, u32, u32)> {
    let s = scale_factor(width, height);
    if s >= 1.0 {
        return Ok((raw, width, height));
    }

    let decoded = image::load_from_memory_with_format(&raw, image::ImageFormat::Png)
        .map_err(|err| Error::capture_failed(format!("decoding frame: {err}")))?;
    let out_width = (width as f64 * s).floor() as u32;
    let out_height = (height as f64 * s).floor() as u32;
    let resized = decoded.resize_exact(out_width, out_height, FilterType::Lanczos3);

    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        &mut bytes,
        CompressionType::Fast,
        PngFilterType::Adaptive,
    );
    resized
        .write_with_encoder(encoder)
        .map_err(|err| Error::capture_failed(format!("encoding frame: {err}")))?;
    Ok((bytes, out_width, out_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn small_frames_pass_through_untouched() {
        let raw = png_bytes(1280, 720);
        let (bytes, w, h) = rescale_png(raw.clone(), 1280, 720).unwrap();
        assert_eq!(bytes, raw);
        assert_eq!((w, h), (1280, 720));
    }

    #[test]
    fn oversized_frames_shrink_within_limits() {
        let raw = png_bytes(1920, 1080);
        let (bytes, w, h) = rescale_png(raw, 1920, 1080).unwrap();
        assert!(w <= 1568 && h <= 1568);
        assert!((w as u64) * (h as u64) <= (1.15 * 1024.0 * 1024.0) as u64);
        let reread = image::load_from_memory(&bytes).unwrap();
        assert_eq!((reread.width(), reread.height()), (w, h));
    }

    #[test]
    fn garbage_bytes_fail_as_capture_failed() {
        let err = rescale_png(vec![0u8; 64], 4000, 4000).unwrap_err();
        assert_eq!(err.kind(), "capture_failed");
    }
}
