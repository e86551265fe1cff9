use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

/// Single error object in the response envelope. Clients only ever see
/// code/title/detail triples, never stack traces or internal identifiers.
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub title: String,
    pub detail: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_object(&self) -> ErrorObject {
        let (code, title, detail) = match self {
            ApiError::Auth(msg) => ("unauthorized", "Authentication failed", msg.clone()),
            ApiError::NotFound(msg) => ("not_found", "Resource not found", msg.clone()),
            ApiError::Validation(msg) => ("validation_failed", "Validation failed", msg.clone()),
            ApiError::Forbidden(msg) => ("forbidden", "Access denied", msg.clone()),
            ApiError::Conflict(msg) => ("conflict", "Conflicting state", msg.clone()),
            // Do not leak internals to the client.
            ApiError::Internal(_) => (
                "internal_error",
                "Internal server error",
                "An unexpected error occurred".to_string(),
            ),
        };

        ErrorObject {
            code: code.to_string(),
            title: title.to_string(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        tracing::error!("Error: {}: {}", status, self);

        let body = Json(json!({
            "errors": [self.error_object()]
        }));

        (status, body).into_response()
    }
}
