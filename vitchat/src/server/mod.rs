//! VITChat server - serves the chat UI and the relay API.
//!
//! Architecture:
//! - One local server (manages PID/port files under ~/.vitchat)
//! - The UI is a single embedded page; it keeps the chat session in memory
//!   and talks to the relay endpoint only
//! - The relay shells out to the Python inference script per request; there
//!   is no shared mutable state between requests
//!
//! Endpoints:
//! - GET  /            - Chat UI
//! - POST /api/chat    - Relay a message to the inference script
//! - GET  /api/health  - Liveness probe

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::inference::{fallback_reply, run_inference, InferenceConfig};

/// Server configuration file paths.
const SERVER_DIR: &str = ".vitchat";
const PID_FILE: &str = "server.pid";
const PORT_FILE: &str = "server.port";

/// Default port for the chat server.
pub const DEFAULT_PORT: u16 = 3000;

/// Shared server state.
///
/// Immutable after startup; every request is independent.
pub struct ServerState {
    /// How to invoke the inference script.
    pub inference: InferenceConfig,
}

// === Request/Response Types ===

/// Successful relay reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API error, rendered as a JSON error body.
#[derive(Debug)]
pub enum ApiError {
    /// Client sent an invalid request.
    BadRequest(&'static str),
    /// Something unexpected broke inside a handler.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// === Server Lifecycle ===

/// Start the server and block until it shuts down.
pub async fn start_server(port: u16, open_browser: bool, inference: InferenceConfig) -> Result<()> {
    let server_dir = get_server_dir()?;
    std::fs::create_dir_all(&server_dir)?;

    let pid = std::process::id();
    std::fs::write(server_dir.join(PID_FILE), pid.to_string())?;
    std::fs::write(server_dir.join(PORT_FILE), port.to_string())?;

    let state = Arc::new(ServerState { inference });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(|_err: Box<dyn std::any::Any + Send>| {
            ApiError::Internal.into_response()
        }))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("VITChat server starting on http://{addr}");

    if open_browser {
        let _ = open::that(format!("http://{addr}"));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.context("Server error")?;

    let _ = std::fs::remove_file(server_dir.join(PID_FILE));
    let _ = std::fs::remove_file(server_dir.join(PORT_FILE));

    Ok(())
}

fn get_server_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(SERVER_DIR))
}

/// Port of a live server, if one is running.
pub fn get_server_port() -> Option<u16> {
    let server_dir = get_server_dir().ok()?;
    let pid_file = server_dir.join(PID_FILE);
    let port_file = server_dir.join(PORT_FILE);

    if let Ok(pid_str) = std::fs::read_to_string(&pid_file) {
        if let Ok(pid) = pid_str.trim().parse::<u32>() {
            #[cfg(unix)]
            {
                use std::process::Command;
                let output = Command::new("kill").args(["-0", &pid.to_string()]).output();
                if output.map(|o| o.status.success()).unwrap_or(false) {
                    if let Ok(port_str) = std::fs::read_to_string(&port_file) {
                        return port_str.trim().parse().ok();
                    }
                }
            }
            #[cfg(not(unix))]
            {
                if let Ok(port_str) = std::fs::read_to_string(&port_file) {
                    return port_str.trim().parse().ok();
                }
            }
        }
    }
    None
}

/// Spawn a detached server process.
pub fn spawn_server_daemon(port: u16) -> Result<()> {
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;

    #[cfg(unix)]
    {
        Command::new(&exe)
            .args(["serve", "--port", &port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn server daemon")?;
    }

    #[cfg(not(unix))]
    {
        Command::new(&exe)
            .args(["serve", "--port", &port.to_string()])
            .spawn()
            .context("Failed to spawn server daemon")?;
    }

    std::thread::sleep(std::time::Duration::from_millis(500));
    Ok(())
}

/// Return the port of a running server, starting one if needed.
pub fn ensure_server_running() -> Result<u16> {
    if let Some(port) = get_server_port() {
        return Ok(port);
    }

    spawn_server_daemon(DEFAULT_PORT)?;

    for _ in 0..20 {
        if let Some(p) = get_server_port() {
            return Ok(p);
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    anyhow::bail!("Server failed to start")
}

// === Handlers ===

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("ui.html"))
}

async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Relay one chat message to the inference script.
///
/// Inference failure never reaches the client as an error; the reply is
/// replaced with a canned fallback keyed on the original input.
async fn chat_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    // Parse the body by hand: a malformed payload must still get the JSON
    // `{error}` shape, not the extractor's plain-text rejection.
    let body: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid JSON body"))?;

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(ApiError::BadRequest("Message is required"))?
        .to_string();

    let response = match run_inference(&state.inference, &message).await {
        Ok(text) => text,
        Err(err) => {
            eprintln!("[inference] {err}");
            fallback_reply(&message)
        }
    };

    Ok(Json(ChatResponse { response }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// State pointing at a script that does not exist, so inference always
    /// fails and the fallback path is exercised.
    fn broken_state() -> Arc<ServerState> {
        Arc::new(ServerState {
            inference: InferenceConfig {
                python: "sh".to_string(),
                script: PathBuf::from("/nonexistent/model.sh"),
                timeout: Duration::from_secs(1),
            },
        })
    }

    fn working_state(dir: &tempfile::TempDir, script_body: &str) -> Arc<ServerState> {
        let script = dir.path().join("model.sh");
        std::fs::write(&script, script_body).unwrap();
        Arc::new(ServerState {
            inference: InferenceConfig {
                python: "sh".to_string(),
                script,
                timeout: Duration::from_secs(5),
            },
        })
    }

    fn json_body(value: &Value) -> Bytes {
        Bytes::from(serde_json::to_vec(value).unwrap())
    }

    /// Read a response body back as the `{error}` wire shape.
    async fn error_body(response: Response) -> ErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_message_is_bad_request() {
        let body = json_body(&serde_json::json!({}));
        let result = chat_handler(State(broken_state()), body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn non_string_message_is_bad_request() {
        let body = json_body(&serde_json::json!({"message": 42}));
        let result = chat_handler(State(broken_state()), body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let body = json_body(&serde_json::json!({"message": "   "}));
        let result = chat_handler(State(broken_state()), body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn malformed_json_body_is_bad_request_with_error_body() {
        let result = chat_handler(State(broken_state()), Bytes::from_static(b"{not json")).await;

        let err = match result {
            Err(err) => err,
            Ok(_) => panic!("malformed body must not reach inference"),
        };
        assert!(matches!(err, ApiError::BadRequest(_)));

        // The rendered response carries the JSON `{error}` shape, not a
        // plain-text rejection.
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn vit_question_falls_back_to_vellore_fact() {
        let body = json_body(&serde_json::json!({"message": "vit"}));
        let Json(reply) = chat_handler(State(broken_state()), body).await.unwrap();
        assert!(reply.response.contains("Vellore"));
    }

    #[tokio::test]
    async fn other_question_falls_back_to_apology() {
        let body = json_body(&serde_json::json!({"message": "hello"}));
        let Json(reply) = chat_handler(State(broken_state()), body).await.unwrap();
        assert!(reply.response.contains("try again"));
        assert!(!reply.response.is_empty());
    }

    #[tokio::test]
    async fn successful_inference_is_relayed() {
        let dir = tempfile::tempdir().unwrap();
        let state = working_state(&dir, r#"echo '{"response": "Founded in 1984."}'"#);

        let body = json_body(&serde_json::json!({"message": "When was VIT founded?"}));
        let Json(reply) = chat_handler(State(state), body).await.unwrap();
        assert_eq!(reply.response, "Founded in 1984.");
    }

    #[tokio::test]
    async fn bad_request_renders_400_with_json_body() {
        let response = ApiError::BadRequest("Message is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = error_body(response).await;
        assert_eq!(body.error, "Message is required");
    }

    #[tokio::test]
    async fn internal_error_renders_500_with_json_body() {
        let response = ApiError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = error_body(response).await;
        assert_eq!(body.error, "Internal server error");
    }
}
