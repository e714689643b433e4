//! HTTP transport for the chat service.
//!
//! A thin axum layer over [`ChatService`]: handlers parse the request,
//! call the facade, and serialize the payload. Each request runs as its
//! own tokio task; the only shared state is the `Arc<ChatService>`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | One chat turn, text response |
//! | `POST` | `/chat_with_tts` | One chat turn, text plus audio when available |
//! | `GET`  | `/pending_responses/{session_id}` | Unexpired cached responses for recovery |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "model_error", "message": "model invocation failed" } }
//! ```
//!
//! Error codes: `bad_request` (400), `model_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the web client is
//! served from a different origin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::chat::ChatService;
use crate::models::ResponsePayload;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    chat: Arc<ChatService>,
}

/// Starts the HTTP service.
///
/// Binds to `bind_addr` and serves until the process is terminated.
pub async fn run_server(chat: Arc<ChatService>, bind_addr: &str) -> anyhow::Result<()> {
    let state = AppState { chat };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/chat_with_tts", post(handle_chat_with_tts))
        .route("/pending_responses/{session_id}", get(handle_pending))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("chat service listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"model_error"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 500 for a failed model turn. The cache means the client can simply
/// retry the identical message once the backend recovers.
fn model_error(err: anyhow::Error) -> AppError {
    error!(error = %err, "chat turn failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "model_error".to_string(),
        message: err.to_string(),
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    session_id: String,
}

#[derive(Serialize)]
struct PendingBody {
    pending_responses: Vec<crate::cache::PendingResponse>,
}

async fn run_turn(
    state: &AppState,
    req: &ChatRequest,
    with_speech: bool,
) -> Result<ResponsePayload, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }
    state
        .chat
        .respond(&req.message, &req.session_id, with_speech)
        .await
        .map_err(model_error)
}

/// `POST /chat` — one turn, text only.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ResponsePayload>, AppError> {
    Ok(Json(run_turn(&state, &req, false).await?))
}

/// `POST /chat_with_tts` — one turn in speech mode; audio fields are set
/// when a synthesizer is available.
async fn handle_chat_with_tts(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ResponsePayload>, AppError> {
    Ok(Json(run_turn(&state, &req, true).await?))
}

/// `GET /pending_responses/{session_id}` — unexpired cached payloads the
/// client can match against its own message hashes after a dropped
/// connection.
async fn handle_pending(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<PendingBody> {
    Json(PendingBody {
        pending_responses: state.chat.pending_responses(&session_id),
    })
}

/// `GET /health` — liveness check with version info.
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
