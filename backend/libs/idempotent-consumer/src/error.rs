use thiserror::Error;

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("idempotency database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("idempotency document store error: {0}")]
    DocumentStore(#[from] mongodb::error::Error),

    #[error("invalid event id: {0}")]
    InvalidEventId(String),
}
