//! The session façade: every operation the RPC shell exposes, with
//! resolve-by-default session lookup and the coordinate-space translation
//! between the client's API image space and the framebuffer's display
//! space.
//!
//! Scaling lives here by design. The input layer only ever sees
//! display-space integers already clamped to the framebuffer, and clients
//! only ever see coordinates in the image they were last shown.

use std::time::Duration;

use core_api::{
    CursorPosition, Error, ExecResult, Result, Screenshot, SessionCreated, SessionDestroyed,
    SessionSummary, WindowInfo, WindowWait,
};
use core_automation::Automation;
use core_capture::{Capturer, api_to_display, clamp_to_display, display_to_api, scale_factor};
use core_config::Config;
use core_session::{CreateOptions, SessionRegistry};
use tracing::debug;

/// Default wait bound for `wait_for_window`.
pub const DEFAULT_WINDOW_WAIT_MS: u64 = 10_000;

/// Per-request overrides for `create`; unset fields fall back to configured
/// defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    pub window_manager: Option<bool>,
}

/// A resolved session plus the scale state needed for coordinate math.
struct Target {
    id: String,
    display: u32,
    width: u32,
    height: u32,
    scale: f64,
}

impl Target {
    /// Map an API-image point into the framebuffer's pixel grid.
    fn display_point(&self, x: i64, y: i64) -> (i64, i64) {
        clamp_to_display(
            api_to_display(x, self.scale),
            api_to_display(y, self.scale),
            self.width,
            self.height,
        )
    }

    fn display_point_opt(&self, coordinate: Option<(i64, i64)>) -> Option<(i64, i64)> {
        coordinate.map(|(x, y)| self.display_point(x, y))
    }
}

/// The operations exposed to the RPC shell.
pub struct SessionFacade {
    registry: SessionRegistry,
    automation: Automation,
    capturer: Capturer,
    defaults: core_config::SessionDefaults,
}

impl SessionFacade {
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_millis(config.timing().tool_timeout_ms);
        Self {
            registry: SessionRegistry::new(config.timing()),
            automation: Automation::new(timeout),
            capturer: Capturer::new(timeout),
            defaults: config.session(),
        }
    }

    fn target(&self, session: Option<&str>) -> Result<Target> {
        let id = self.registry.resolve_id(session)?;
        let session = self.registry.get(&id)?;
        let (width, height) = (session.width(), session.height());
        Ok(Target {
            id,
            display: session.display(),
            width,
            height,
            scale: scale_factor(width, height),
        })
    }

    // --- lifecycle -----------------------------------------------------

    pub async fn create(&mut self, request: CreateRequest) -> Result<SessionCreated> {
        let opts = CreateOptions {
            width: request.width.unwrap_or(self.defaults.width),
            height: request.height.unwrap_or(self.defaults.height),
            depth: request.depth.unwrap_or(self.defaults.depth),
            window_manager: request.window_manager.unwrap_or(self.defaults.window_manager),
        };
        if opts.width == 0 || opts.height == 0 {
            return Err(Error::invalid_argument("width and height must be positive"));
        }
        if opts.depth == 0 {
            return Err(Error::invalid_argument("depth must be positive"));
        }
        self.registry.create(opts).await
    }

    pub async fn destroy(&mut self, id: &str) -> Result<SessionDestroyed> {
        self.registry.destroy(id).await
    }

    pub async fn destroy_all(&mut self) {
        self.registry.destroy_all().await;
    }

    pub fn list(&mut self) -> Vec<SessionSummary> {
        self.registry.list()
    }

    pub fn resolve(&self, session: Option<&str>) -> Result<String> {
        self.registry.resolve_id(session)
    }

    pub async fn exec(
        &mut self,
        session: Option<&str>,
        command: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<ExecResult> {
        let id = self.registry.resolve_id(session)?;
        self.registry.exec(&id, command, args, env).await
    }

    // --- input synthesis -----------------------------------------------

    pub async fn send_key(&mut self, session: Option<&str>, key: &str) -> Result<()> {
        let target = self.target(session)?;
        self.automation.send_key(target.display, key).await
    }

    pub async fn send_type(&mut self, session: Option<&str>, text: &str) -> Result<()> {
        let target = self.target(session)?;
        self.automation.send_type(target.display, text).await
    }

    pub async fn mouse_move(&mut self, session: Option<&str>, x: i64, y: i64) -> Result<()> {
        let target = self.target(session)?;
        let (dx, dy) = target.display_point(x, y);
        debug!(target: "facade.input", session = %target.id, x, y, dx, dy, "mouse_move");
        self.automation.mouse_move(target.display, dx, dy).await
    }

    pub async fn mouse_click(
        &mut self,
        session: Option<&str>,
        button: u8,
        coordinate: Option<(i64, i64)>,
    ) -> Result<()> {
        if !(1..=3).contains(&button) {
            return Err(Error::invalid_argument(format!(
                "mouse button must be 1..=3, got {button}"
            )));
        }
        let target = self.target(session)?;
        let position = target.display_point_opt(coordinate);
        self.automation
            .mouse_click(target.display, button, position)
            .await
    }

    pub async fn mouse_double_click(
        &mut self,
        session: Option<&str>,
        coordinate: Option<(i64, i64)>,
    ) -> Result<()> {
        let target = self.target(session)?;
        let position = target.display_point_opt(coordinate);
        self.automation
            .mouse_double_click(target.display, position)
            .await
    }

    pub async fn mouse_drag(&mut self, session: Option<&str>, x: i64, y: i64) -> Result<()> {
        let target = self.target(session)?;
        let (dx, dy) = target.display_point(x, y);
        self.automation.mouse_drag(target.display, dx, dy).await
    }

    pub async fn mouse_scroll(
        &mut self,
        session: Option<&str>,
        direction: &str,
        amount: Option<f64>,
        coordinate: Option<(i64, i64)>,
    ) -> Result<()> {
        let target = self.target(session)?;
        let position = target.display_point_opt(coordinate);
        self.automation
            .mouse_scroll(target.display, direction, amount, position)
            .await
    }

    /// Pointer position reported in API image space.
    pub async fn cursor_position(&mut self, session: Option<&str>) -> Result<CursorPosition> {
        let target = self.target(session)?;
        let (x, y) = self.automation.cursor_position(target.display).await?;
        Ok(CursorPosition {
            x: display_to_api(x, target.scale),
            y: display_to_api(y, target.scale),
        })
    }

    // --- capture and windows -------------------------------------------

    pub async fn screenshot(&mut self, session: Option<&str>) -> Result<Screenshot> {
        let target = self.target(session)?;
        self.capturer
            .screenshot(target.display, target.width, target.height)
            .await
    }

    pub async fn find_windows(
        &mut self,
        session: Option<&str>,
        title_pattern: Option<&str>,
    ) -> Result<Vec<WindowInfo>> {
        let target = self.target(session)?;
        Ok(self.automation.find_windows(target.display, title_pattern).await)
    }

    pub async fn wait_for_window(
        &mut self,
        session: Option<&str>,
        title: &str,
        timeout_ms: Option<u64>,
    ) -> Result<WindowWait> {
        let target = self.target(session)?;
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_WINDOW_WAIT_MS);
        match self
            .automation
            .wait_for_window(target.display, title, timeout_ms)
            .await
        {
            Some(window) => Ok(WindowWait::found(window)),
            None => Ok(WindowWait::timed_out(title, timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(width: u32, height: u32) -> Target {
        Target {
            id: "s1".into(),
            display: 99,
            width,
            height,
            scale: scale_factor(width, height),
        }
    }

    #[test]
    fn unscaled_sessions_map_coordinates_identically() {
        let t = target(1280, 720);
        assert_eq!(t.display_point(640, 360), (640, 360));
        assert_eq!(t.display_point(0, 0), (0, 0));
        assert_eq!(t.display_point(1279, 719), (1279, 719));
    }

    #[test]
    fn scaled_sessions_expand_coordinates_by_the_inverse_scalar() {
        let t = target(1920, 1080);
        let s = t.scale;
        let (dx, dy) = t.display_point(784, 441);
        assert_eq!(dx, (784.0 / s).round() as i64);
        assert_eq!(dy, (441.0 / s).round() as i64);
        assert!((0..1920).contains(&dx));
        assert!((0..1080).contains(&dy));
    }

    #[test]
    fn out_of_range_coordinates_clamp_to_the_framebuffer() {
        let t = target(1280, 720);
        assert_eq!(t.display_point(5000, 5000), (1279, 719));
        assert_eq!(t.display_point(-10, -10), (0, 0));
    }

    #[test]
    fn cursor_round_trip_stays_within_one_pixel() {
        let t = target(1920, 1080);
        for (x, y) in [(0i64, 0i64), (100, 50), (784, 441), (1463, 822)] {
            let (dx, dy) = t.display_point(x, y);
            let back = (display_to_api(dx, t.scale), display_to_api(dy, t.scale));
            assert!((back.0 - x).abs() <= 1, "x {x} -> {dx} -> {}", back.0);
            assert!((back.1 - y).abs() <= 1, "y {y} -> {dy} -> {}", back.1);
        }
    }

    #[tokio::test]
    async fn operations_without_sessions_resolve_to_no_session() {
        let mut facade = SessionFacade::new(&Config::default());
        let err = facade.send_key(None, "Return").await.unwrap_err();
        assert!(matches!(err, Error::NoSession));
        let err = facade.screenshot(None).await.unwrap_err();
        assert!(matches!(err, Error::NoSession));
    }

    #[tokio::test]
    async fn bad_mouse_button_is_rejected_before_resolution() {
        let mut facade = SessionFacade::new(&Config::default());
        let err = facade.mouse_click(None, 9, None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[tokio::test]
    async fn create_rejects_zero_geometry() {
        let mut facade = SessionFacade::new(&Config::default());
        let err = facade
            .create(CreateRequest {
                width: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[tokio::test]
    async fn destroy_unknown_session_is_not_found() {
        let mut facade = SessionFacade::new(&Config::default());
        assert!(matches!(
            facade.destroy("s42").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn destroy_all_on_empty_registry_is_a_no_op() {
        let mut facade = SessionFacade::new(&Config::default());
        facade.destroy_all().await;
        assert!(facade.list().is_empty());
    }
}
