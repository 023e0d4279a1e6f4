//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The bot exposes one webhook endpoint at a secret path plus two probes.
//! Telegram posts updates to `/{secret}`; `/` answers with a liveness string
//! and `/healthz` with a bare 200.

pub mod webhook;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub const HOME_TEXT: &str = "Bot Running ✅";

/// Build the application router. `webhook_secret` must already be validated
/// as a single path segment.
pub fn app(state: AppState, webhook_secret: &str) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route(&format!("/{webhook_secret}"), post(webhook::receive_update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> &'static str {
    HOME_TEXT
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
