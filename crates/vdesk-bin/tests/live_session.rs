//! End-to-end scenarios against a real X stack.
//!
//! These tests drive the façade with actual Xvfb, xdotool, and ffmpeg
//! subprocesses and are ignored by default; run them on a host with the
//! display tooling installed:
//!
//! ```sh
//! cargo test -p vdesk --test live_session -- --ignored
//! ```

use core_api::{Error, WindowWait};
use core_capture::scale_factor;
use core_config::Config;
use core_facade::{CreateRequest, SessionFacade};

fn facade() -> SessionFacade {
    SessionFacade::new(&Config::default())
}

fn create_request(width: u32, height: u32) -> CreateRequest {
    CreateRequest {
        width: Some(width),
        height: Some(height),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, and ffmpeg on PATH"]
async fn create_list_destroy_round_trip() {
    let mut facade = facade();
    let created = facade.create(create_request(1280, 720)).await.unwrap();
    assert_eq!(created.width, 1280);
    assert_eq!(created.height, 720);
    assert!(created.display >= 99);

    let listed = facade.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.session_id);
    assert_eq!(listed[0].display, created.display);
    assert!(listed[0].processes.is_empty());

    facade.destroy(&created.session_id).await.unwrap();
    assert!(facade.list().is_empty());
    assert!(matches!(
        facade.destroy(&created.session_id).await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, and ffmpeg on PATH"]
async fn screenshot_dimensions_follow_the_rescale_policy() {
    let mut facade = facade();
    facade.create(create_request(1920, 1080)).await.unwrap();

    let shot = facade.screenshot(None).await.unwrap();
    let s = scale_factor(1920, 1080);
    assert_eq!(shot.display_width_px, (1920.0 * s).floor() as u32);
    assert_eq!(shot.display_height_px, (1080.0 * s).floor() as u32);
    assert!(shot.display_width_px <= 1568 && shot.display_height_px <= 1568);
    assert_eq!(shot.media_type, "image/png");
    assert!(!shot.data.is_empty());

    facade.destroy_all().await;
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, and ffmpeg on PATH"]
async fn cursor_round_trips_through_api_image_space() {
    let mut facade = facade();
    facade.create(create_request(1920, 1080)).await.unwrap();

    facade.mouse_move(None, 784, 441).await.unwrap();
    let cursor = facade.cursor_position(None).await.unwrap();
    assert!((cursor.x - 784).abs() <= 1, "x came back as {}", cursor.x);
    assert!((cursor.y - 441).abs() <= 1, "y came back as {}", cursor.y);

    facade.destroy_all().await;
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, and ffmpeg on PATH"]
async fn failed_launch_leaves_no_process_record() {
    let mut facade = facade();
    facade.create(create_request(1024, 768)).await.unwrap();

    let err = facade
        .exec(None, "/bin/does-not-exist", &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LaunchFailed { .. }));
    assert!(facade.list()[0].processes.is_empty());

    facade.destroy_all().await;
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, ffmpeg, and xmessage on PATH"]
async fn launched_window_is_found_by_title() {
    let mut facade = facade();
    facade.create(create_request(1024, 768)).await.unwrap();

    let args: Vec<String> = ["-geometry", "400x200+100+100", "hi"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    facade.exec(None, "xmessage", &args, &[]).await.unwrap();

    match facade
        .wait_for_window(None, "xmessage", Some(5000))
        .await
        .unwrap()
    {
        WindowWait::Found { window, .. } => {
            assert_eq!(window.width, 400);
            assert_eq!(window.height, 200);
        }
        WindowWait::TimedOut { .. } => panic!("xmessage window never appeared"),
    }

    facade.destroy_all().await;
}

#[tokio::test]
#[ignore = "requires Xvfb, xdpyinfo, openbox, xdotool, and ffmpeg on PATH"]
async fn sessions_are_isolated() {
    let mut facade = facade();
    let a = facade.create(create_request(1024, 768)).await.unwrap();
    let b = facade.create(create_request(1024, 768)).await.unwrap();
    assert_ne!(a.session_id, b.session_id);
    assert_ne!(a.display, b.display);

    facade.destroy(&a.session_id).await.unwrap();
    let shot = facade
        .screenshot(Some(b.session_id.as_str()))
        .await
        .unwrap();
    assert!(!shot.data.is_empty());

    facade.destroy_all().await;
    assert!(facade.list().is_empty());
}
