//! Webhook intake.
//!
//! The handler parses the update and hands it to the dispatcher queue, then
//! returns immediately so Telegram never waits on downloads or renders.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::state::AppState;
use crate::telegram::types::Update;

/// `POST /{secret}` — accept one update.
///
/// Malformed JSON gets a 400. A full or closed queue gets a 503 so Telegram
/// redelivers the update later.
pub async fn receive_update(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "rejecting malformed webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({ "ok": false })));
        }
    };

    let update_id = update.update_id;
    match state.updates.try_send(update) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(TrySendError::Full(_)) => {
            warn!(update_id, "update queue full");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false })))
        }
        Err(TrySendError::Closed(_)) => {
            warn!(update_id, "update queue closed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false })))
        }
    }
}
