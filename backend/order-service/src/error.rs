//! Error types for the order service, mapped to HTTP responses.
//!
//! Rejections that conflict with the current aggregate state map to 409;
//! invalid input maps to 400.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("order {0} not found")]
    NotFound(u64),

    #[error("order {order_id} cannot be paid in status {status}")]
    IllegalTransition { order_id: u64, status: String },

    #[error("order {0} is already canceled")]
    AlreadyCanceled(u64),

    #[error("order {0} is paid and cannot be canceled")]
    PaidNotCancellable(u64),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<transactional_outbox::OutboxError> for AppError {
    fn from(err: transactional_outbox::OutboxError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::IllegalTransition { .. }
            | AppError::AlreadyCanceled(_)
            | AppError::PaidNotCancellable(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Database(e) => serde_json::json!({
                "error": "internal server error",
                "details": e.to_string(),
            }),
            AppError::Internal(details) => serde_json::json!({
                "error": "internal server error",
                "details": details,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_conflicts_map_to_409() {
        assert_eq!(
            AppError::IllegalTransition {
                order_id: 1,
                status: "PAID".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::AlreadyCanceled(1).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::PaidNotCancellable(1).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn lookup_and_input_errors_keep_their_codes() {
        assert_eq!(AppError::NotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Validation("order must have at least one item".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
