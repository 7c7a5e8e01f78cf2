use thiserror::Error;

pub type OutboxResult<T> = Result<T, OutboxError>;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize outbox payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("outbox entry {0} not found")]
    EntryNotFound(u64),

    #[error("failed to publish outbox entry: {0}")]
    PublishFailed(String),
}
