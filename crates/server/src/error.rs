use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Application error for HTTP handlers.
///
/// Every handler maps its own failures onto one of these variants; the
/// [`IntoResponse`] impl turns them into the JSON error bodies clients see.
/// Internal details are logged and never leak into a response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body failed declarative validation; carries the per-field
    /// error list.
    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    /// Missing or unusable credentials.
    #[error("{0}")]
    AuthError(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Store failure surfaced through the database layer.
    #[error(transparent)]
    Database(#[from] anyhow::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            AppError::AuthError(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            AppError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
