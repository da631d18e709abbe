//! Reading Routes
//!
//! Entry point for upstream producers (edge sampling devices).
//!
//! - POST /api/v1/readings - Broadcast one reading to every open WebSocket

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::ReadingResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /api/v1/readings
///
/// The body is any JSON document; it becomes the `value` of the envelope.
pub async fn post_reading(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReadingResponse>)> {
    let Json(value) = payload?;

    let report = state.hub.broadcast(&value).await?;

    tracing::info!(
        time = %report.time,
        sent = report.sent,
        pruned = report.pruned,
        "Reading broadcast"
    );

    Ok((StatusCode::ACCEPTED, Json(report.into())))
}
