//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, HealthResponse};

/// Health check endpoint
///
/// Pings the trade store. Storage error detail is logged, not returned.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = crate::gateway::types::ErrorResponse)
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.executor.store();
    match store.ping().await {
        Ok(()) => Ok(Json(HealthResponse {
            status: "ok".to_string(),
        })),
        Err(e) => {
            tracing::error!(store = store.name(), "[HEALTH] store ping failed: {}", e);
            Err(ApiError::service_unavailable("unavailable"))
        }
    }
}
