//! Error handling for the Concierge Door service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Object not found in the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request (ingress payloads)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (env values, function references)
    #[error("Config error: {0}")]
    Config(String),

    /// Face matcher returned a non-success status
    #[error("Face matcher error: {0}")]
    FaceMatcher(String),

    /// Actuation channel rejected the publish
    #[error("Actuation error: {0}")]
    Actuation(String),

    /// Notification webhook unreachable or non-success status
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Second-factor function failure
    #[error("Second factor error: {0}")]
    SecondFactor(String),

    /// Missing or wrong trigger credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLx database error
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::FaceMatcher(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "FACE_MATCHER_ERROR",
                msg.clone(),
            ),
            Error::Actuation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ACTUATION_ERROR",
                msg.clone(),
            ),
            Error::Notifier(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "NOTIFIER_ERROR",
                msg.clone(),
            ),
            Error::SecondFactor(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SECOND_FACTOR_ERROR",
                msg.clone(),
            ),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HTTP_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
            Error::Sqlx(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
