//! bgdv-api library - HTTP front end of the geometry validator

use axum::Router;
use bgdv_common::TomlConfig;
use bgdv_engine::GeometryValidator;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Validator with the loaded reference data
    pub validator: Arc<GeometryValidator>,
    /// Upper bound on one validation request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(validator: GeometryValidator, request_timeout: Duration) -> Self {
        Self {
            validator: Arc::new(validator),
            request_timeout,
        }
    }

    /// State from the service configuration
    pub fn from_config(config: &TomlConfig) -> bgdv_common::Result<Self> {
        Ok(Self::new(
            GeometryValidator::from_config(config)?,
            config.server.request_timeout(),
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::validation_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
