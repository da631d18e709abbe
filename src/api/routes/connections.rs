//! Connection Routes
//!
//! - GET /api/v1/connections - Number of registered WebSocket connections

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::ConnectionsResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/v1/connections
pub async fn connection_count(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ConnectionsResponse>> {
    let connections = state.hub.connection_count().await?;
    Ok(Json(ConnectionsResponse { connections }))
}
