use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chartcast_core::error::CoreError;
use chartcast_pipeline::encoder::EncodeError;
use chartcast_pipeline::registry::RegistryError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job registry lookup or lifecycle error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Synchronous encoding of uploaded frames failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Registry errors ---
            AppError::Registry(err) => match err {
                RegistryError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                RegistryError::Invalid(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                RegistryError::Conflict(_)
                | RegistryError::InvalidTransition { .. }
                | RegistryError::ProgressRegression { .. } => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
            },

            // --- Encoder errors ---
            AppError::Encode(err) => match err {
                EncodeError::EmptyInput | EncodeError::DimensionMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                EncodeError::AlreadyExists(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                EncodeError::WriteFailed(_) | EncodeError::Unreadable(_) => {
                    internal(&err.to_string())
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Log the real cause and hand the client a sanitized message.
fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
