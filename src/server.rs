use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;
use crate::error::AppError;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for the HTTP layer
pub struct ServerState {
    pub dispatcher: Dispatcher,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`. `None` disables the check.
    pub webhook_secret: Option<String>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<ServerState>;

pub fn router(state: SharedState, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(webhook))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    if let Some(ref expected) = state.webhook_secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if !secrets_match(given, expected) {
            tracing::warn!("webhook secret mismatch, rejecting delivery");
            return Err(AppError::Unauthorized);
        }
    }
    Ok(state.dispatcher.handle(headers, body).await)
}

/// Length-independent comparison so timing does not leak the prefix.
fn secrets_match(given: Option<&str>, expected: &str) -> bool {
    let Some(given) = given else { return false };
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime: String,
    test_ack: bool,
    version: &'static str,
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let uptime = chrono::Utc::now() - state.start_time;
    Json(HealthResponse {
        status: "ok",
        uptime: format!("{}h {}m", uptime.num_hours(), uptime.num_minutes() % 60),
        test_ack: state.dispatcher.test_ack(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
