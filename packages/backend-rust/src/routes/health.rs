use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
    uptime: u64,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let ok = state.db().ping().await;
    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: if ok { "connected" } else { "disconnected" },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.uptime_seconds(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}
