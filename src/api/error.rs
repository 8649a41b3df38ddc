use crate::services::import::ImportError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Code carried by every failed result envelope.
pub const FAILURE_CODE: i32 = -1;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unprocessable archive: {0}")]
    Unprocessable(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("Service Unavailable: {0}")]
    Unavailable(String),
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        let message = err.public_message();
        match err {
            ImportError::Unauthorized | ImportError::InvalidOwnerKey(_) => {
                AppError::Unauthorized(message)
            }
            ImportError::Input(_) => AppError::BadRequest(message),
            ImportError::UnsafeEntry { .. }
            | ImportError::Unpack { .. }
            | ImportError::LimitExceeded(_) => AppError::Unprocessable(message),
            ImportError::Cancelled => AppError::Unavailable(message),
            ImportError::Workspace { .. } | ImportError::Task(_) => AppError::ImportFailed(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::ImportFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(json!({
            "code": FAILURE_CODE,
            "msg": message
        }));

        (status, body).into_response()
    }
}
