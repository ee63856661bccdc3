//! JSON-RPC 2.0 framing and method dispatch.
//!
//! The shell layer adds no session semantics: it parses one request per
//! line, validates argument shapes, calls the façade, and maps the error
//! taxonomy onto stable protocol codes. Notifications (requests without an
//! id) are executed but never answered.

use std::collections::HashMap;
use std::sync::Arc;

use core_api::Error;
use core_facade::{CreateRequest, SessionFacade};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

/// Color depths the shell accepts. The core itself takes any positive
/// depth; the protocol narrows to what the framebuffer stack supports.
const VALID_DEPTHS: [u32; 3] = [16, 24, 32];

pub(crate) struct RpcError {
    code: i64,
    message: String,
    kind: &'static str,
}

impl RpcError {
    fn parse_error(message: String) -> Self {
        Self {
            code: -32700,
            message,
            kind: "parse_error",
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("unknown method: {method}"),
            kind: "method_not_found",
        }
    }

    fn invalid_params(message: String) -> Self {
        Self {
            code: -32602,
            message,
            kind: "invalid_argument",
        }
    }

    fn internal(message: String) -> Self {
        Self {
            code: -32603,
            message,
            kind: "internal",
        }
    }
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidArgument { .. } => -32602,
            Error::NotFound { .. } => -32001,
            Error::NoSession => -32002,
            Error::Ambiguous { .. } => -32003,
            Error::InitFailed { .. } => -32004,
            Error::LaunchFailed { .. } => -32005,
            Error::ToolFailed { .. } => -32006,
            Error::Timeout { .. } => -32007,
            Error::CaptureFailed { .. } => -32008,
            Error::Io(_) => -32000,
        };
        Self {
            code,
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Handle one request line. Returns the response line, or `None` for
/// notifications.
pub(crate) async fn handle_line(facade: &Arc<Mutex<SessionFacade>>, line: &str) -> Option<String> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            return Some(error_response(
                Value::Null,
                &RpcError::parse_error(format!("invalid request: {err}")),
            ));
        }
    };

    debug!(target: "rpc", method = %request.method, "request");
    let params = request.params.unwrap_or_else(|| json!({}));
    let outcome = dispatch(facade, &request.method, params).await;

    let id = request.id?;
    Some(match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string(),
        Err(err) => error_response(id, &err),
    })
}

fn error_response(id: Value, err: &RpcError) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": err.code,
            "message": err.message,
            "data": {"kind": err.kind},
        },
    })
    .to_string()
}

fn parse_params<P: serde::de::DeserializeOwned>(params: &Value) -> Result<P, RpcError> {
    serde_json::from_value(params.clone())
        .map_err(|err| RpcError::invalid_params(format!("invalid params: {err}")))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::internal(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct CreateParams {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    window_manager: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SessionIdParams {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct OptionalSessionParams {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecParams {
    #[serde(default)]
    session_id: Option<String>,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FindWindowsParams {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    title_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaitForWindowParams {
    #[serde(default)]
    session_id: Option<String>,
    title: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ComputerParams {
    #[serde(default)]
    session_id: Option<String>,
    action: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    coordinate: Option<[i64; 2]>,
    #[serde(default)]
    scroll_direction: Option<String>,
    #[serde(default)]
    scroll_amount: Option<f64>,
}

async fn dispatch(
    facade: &Arc<Mutex<SessionFacade>>,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    match method {
        "create_session" => {
            let p: CreateParams = parse_params(&params)?;
            if let Some(depth) = p.depth
                && !VALID_DEPTHS.contains(&depth)
            {
                return Err(RpcError::invalid_params(format!(
                    "depth must be one of 16, 24, 32; got {depth}"
                )));
            }
            let created = facade
                .lock()
                .await
                .create(CreateRequest {
                    width: p.width,
                    height: p.height,
                    depth: p.depth,
                    window_manager: p.window_manager,
                })
                .await?;
            to_value(created)
        }
        "destroy_session" => {
            let p: SessionIdParams = parse_params(&params)?;
            let destroyed = facade.lock().await.destroy(&p.session_id).await?;
            to_value(destroyed)
        }
        "destroy_all_sessions" => {
            facade.lock().await.destroy_all().await;
            Ok(json!({"ok": true}))
        }
        "list_sessions" => to_value(facade.lock().await.list()),
        "resolve_session" => {
            let p: OptionalSessionParams = parse_params(&params)?;
            let id = facade.lock().await.resolve(p.session_id.as_deref())?;
            Ok(json!({"session_id": id}))
        }
        "run_in_session" => {
            let p: ExecParams = parse_params(&params)?;
            let env: Vec<(String, String)> = p.env.into_iter().collect();
            let result = facade
                .lock()
                .await
                .exec(p.session_id.as_deref(), &p.command, &p.args, &env)
                .await?;
            to_value(result)
        }
        "find_windows" => {
            let p: FindWindowsParams = parse_params(&params)?;
            let windows = facade
                .lock()
                .await
                .find_windows(p.session_id.as_deref(), p.title_pattern.as_deref())
                .await?;
            to_value(windows)
        }
        "wait_for_window" => {
            let p: WaitForWindowParams = parse_params(&params)?;
            let wait = facade
                .lock()
                .await
                .wait_for_window(p.session_id.as_deref(), &p.title, p.timeout_ms)
                .await?;
            to_value(wait)
        }
        "computer" => computer(facade, params).await,
        _ => Err(RpcError::method_not_found(method)),
    }
}

/// Dispatch one `computer` action. Text and coordinate requirements are
/// enforced here so the façade only ever sees complete arguments.
async fn computer(
    facade: &Arc<Mutex<SessionFacade>>,
    params: Value,
) -> Result<Value, RpcError> {
    let p: ComputerParams = parse_params(&params)?;
    let session = p.session_id.as_deref();
    let coordinate = p.coordinate.map(|[x, y]| (x, y));
    let action = p.action.as_str();

    let require_text = || {
        p.text
            .clone()
            .ok_or_else(|| RpcError::invalid_params(format!("action {action} requires text")))
    };
    let require_coordinate = || {
        coordinate.ok_or_else(|| {
            RpcError::invalid_params(format!("action {action} requires a coordinate"))
        })
    };

    let mut facade = facade.lock().await;
    match action {
        "key" => {
            facade.send_key(session, &require_text()?).await?;
            Ok(json!({"ok": true}))
        }
        "type" => {
            facade.send_type(session, &require_text()?).await?;
            Ok(json!({"ok": true}))
        }
        "mouse_move" => {
            let (x, y) = require_coordinate()?;
            facade.mouse_move(session, x, y).await?;
            Ok(json!({"ok": true}))
        }
        "left_click" | "middle_click" | "right_click" => {
            let button = match action {
                "left_click" => 1,
                "middle_click" => 2,
                _ => 3,
            };
            facade.mouse_click(session, button, coordinate).await?;
            Ok(json!({"ok": true}))
        }
        "double_click" => {
            facade.mouse_double_click(session, coordinate).await?;
            Ok(json!({"ok": true}))
        }
        "left_click_drag" => {
            let (x, y) = require_coordinate()?;
            facade.mouse_drag(session, x, y).await?;
            Ok(json!({"ok": true}))
        }
        "scroll" => {
            let direction = p.scroll_direction.clone().ok_or_else(|| {
                RpcError::invalid_params("action scroll requires scroll_direction".to_string())
            })?;
            facade
                .mouse_scroll(session, &direction, p.scroll_amount, coordinate)
                .await?;
            Ok(json!({"ok": true}))
        }
        "cursor_position" | "get_cursor_position" => {
            to_value(facade.cursor_position(session).await?)
        }
        "screenshot" | "get_screenshot" => to_value(facade.screenshot(session).await?),
        other => Err(Error::invalid_argument(format!("unknown action: {other}")).into()),
    }
}
