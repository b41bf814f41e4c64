use super::{header_str, secret_matches};
use crate::AppState;
use anima_core::TelegramUpdate;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

/// Either header may carry the shared webhook secret.
pub const SECRET_HEADERS: [&str; 2] = ["x-webhook-secret", "x-telegram-bot-api-secret-token"];

/// POST /webhook/telegram
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let secret = &state.config.webhook_secret;
    if !secret.is_empty() && !SECRET_HEADERS.iter().any(|h| secret_matches(secret, header_str(&headers, h))) {
        tracing::warn!(target: "anima::telegram", "webhook secret mismatch");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false, "error": "unauthorized" })));
    }

    // Telegram retries non-2xx responses, so a malformed body is acknowledged.
    let update = match serde_json::from_slice::<TelegramUpdate>(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(target: "anima::telegram", error = %e, "unparseable update body");
            return (StatusCode::OK, Json(json!({ "ok": false })));
        }
    };

    match state.engine.handle_update(update).await {
        Ok(outcome) => (StatusCode::OK, Json(json!({ "ok": outcome.ok() }))),
        Err(e) => {
            tracing::error!(target: "anima::telegram", error = %e, "update refused");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ok": false, "error": "store unavailable" })),
            )
        }
    }
}
