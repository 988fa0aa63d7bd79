//! API Routes

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::error::{Error, Result};
use crate::labeling_pipeline::{LabelRequest, CARD_ACTION_STATUS_HEADER};
use crate::models::StorageEventNotification;
use crate::state::AppState;

/// Header carrying the manual trigger's shared secret
pub const TRIGGER_TOKEN_HEADER: &str = "x-trigger-token";

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(super::health_check))
        // Storage trigger
        .route("/api/events/capture", post(capture_event))
        // Triage card callbacks
        .route("/api/label", post(label))
        // Manual trigger
        .route("/api/open", post(open_door))
        .with_state(state)
}

/// Run the access pipeline for every record, in order.
///
/// A failing record does not stop the rest of the batch. Any failure answers
/// 500 so the trigger redelivers; records finished by an earlier delivery
/// report `already_processed` on the retry.
async fn capture_event(
    State(state): State<AppState>,
    Json(notification): Json<StorageEventNotification>,
) -> Result<Response> {
    let events = notification.capture_events();
    if events.is_empty() {
        return Err(Error::Validation("notification has no records".to_string()));
    }

    let mut outcomes = Vec::with_capacity(events.len());
    let mut errors = Vec::new();
    for event in &events {
        match state.access_pipeline.handle(event).await {
            Ok(outcome) => outcomes.push(json!(outcome)),
            Err(e) => {
                tracing::error!(key = %event.artifact_key, error = %e, "Capture record failed");
                errors.push(json!({ "key": event.artifact_key, "error": e.to_string() }));
            }
        }
    }

    if errors.is_empty() {
        return Ok(Json(json!({ "ok": true, "outcomes": outcomes })).into_response());
    }

    Ok((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "outcomes": outcomes, "errors": errors })),
    )
        .into_response())
}

/// Label or discard a staged unknown face
async fn label(
    State(state): State<AppState>,
    Json(req): Json<LabelRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.labeling_pipeline.handle(&req).await?;

    let name = HeaderName::from_bytes(CARD_ACTION_STATUS_HEADER.as_bytes())
        .map_err(|e| Error::Internal(format!("invalid header name: {}", e)))?;
    let status = HeaderValue::from_str(&outcome.status_header())
        .map_err(|e| Error::Internal(format!("invalid status header: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(name, status)],
        Json(json!({ "ok": true, "data": outcome })),
    ))
}

/// Open the door for the configured trigger username (alternate trigger).
/// Requires the shared trigger token; the request body is ignored.
async fn open_door(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let expected = state
        .config
        .trigger_token
        .as_deref()
        .ok_or_else(|| Error::Unauthorized("manual trigger is disabled".to_string()))?;

    let presented = headers
        .get(TRIGGER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != expected {
        tracing::warn!("Manual open rejected: bad trigger token");
        return Err(Error::Unauthorized("invalid trigger token".to_string()));
    }

    let username = &state.config.trigger_username;
    tracing::info!(username = %username, "Manual open triggered");
    let outcome = state.access_pipeline.trigger(username).await?;

    Ok(Json(json!({ "ok": true, "data": outcome })))
}
