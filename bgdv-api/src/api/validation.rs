//! Validation endpoint
//!
//! POST /validation takes the request envelope
//! (`{"geometries": [...], ...}`) and answers with the same envelope, each
//! geometry replaced by its validated form.
//!
//! Validation is CPU bound and runs on the blocking pool, bounded by the
//! configured request timeout.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /validation
pub async fn validate_geometries(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let validator = Arc::clone(&state.validator);
    let task = tokio::task::spawn_blocking(move || validator.request_validate_bike_geometry(request));

    let response = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => return Err(ApiError::Internal(format!("Validation task failed: {}", e))),
        // The blocking task still runs to completion, its result is dropped
        Err(_) => {
            warn!("Validation exceeded {:?}", state.request_timeout);
            return Err(ApiError::Timeout(format!(
                "validation did not finish within {} ms",
                state.request_timeout.as_millis()
            )));
        }
    };

    info!(
        geometries = response["geometries"].as_array().map_or(0, Vec::len),
        "Validation request completed"
    );

    Ok(Json(response))
}

/// Build validation routes
pub fn validation_routes() -> Router<AppState> {
    Router::new().route("/validation", post(validate_geometries))
}
