use super::{header_str, secret_matches};
use crate::AppState;
use anima_core::reports;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const TOKEN_HEADER: &str = "x-token";

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let token = &state.config.reports_token;
    if token.is_empty() || secret_matches(token, header_str(headers, TOKEN_HEADER)) {
        return Ok(());
    }
    tracing::warn!(target: "anima::reports", "report request with a bad token");
    Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response())
}

fn failure(e: anima_core::StoreError) -> Response {
    tracing::error!(target: "anima::reports", error = %e, "report failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
}

/// GET /reports/summary
pub async fn summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    match reports::summary(state.engine.store(), chrono::Utc::now()) {
        Ok(report) => Json(report).into_response(),
        Err(e) => failure(e),
    }
}

/// GET /reports/user/:uid
pub async fn user(State(state): State<AppState>, Path(uid): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    match reports::user_report(state.engine.store(), uid, chrono::Utc::now()) {
        Ok(report) => Json(report).into_response(),
        Err(e) => failure(e),
    }
}
