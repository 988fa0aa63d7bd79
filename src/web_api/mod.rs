//! WebAPI - HTTP ingress
//!
//! ## Responsibilities
//!
//! - Storage event ingress → AccessEventPipeline
//! - Triage card callbacks → LabelingPipeline
//! - Manual open trigger
//! - Health

mod routes;

pub use routes::{create_router, TRIGGER_TOKEN_HEADER};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rate_limit_enabled: state.access_pipeline.rate_limit_enabled(),
        second_factor_enabled: state.access_pipeline.second_factor_enabled(),
    })
}
