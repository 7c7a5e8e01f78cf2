use async_trait::async_trait;
use sqlx::{MySqlPool, Row};
use tracing::debug;

use crate::error::IdempotencyResult;
use crate::ProcessedEventStore;

/// Processed-event store backed by the service's write database.
///
/// `processed_events` has a composite primary key on
/// `(event_id, service_name)`; `INSERT IGNORE` turns the duplicate-key
/// collision into a zero-row insert.
#[derive(Clone)]
pub struct MySqlProcessedEventStore {
    pool: MySqlPool,
}

impl MySqlProcessedEventStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for MySqlProcessedEventStore {
    async fn is_processed(&self, event_id: &str, service_name: &str) -> IdempotencyResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events
                WHERE event_id = ? AND service_name = ?
            ) AS seen
            "#,
        )
        .bind(event_id)
        .bind(service_name)
        .fetch_one(&self.pool)
        .await?;

        let seen: i64 = row.try_get("seen")?;
        Ok(seen != 0)
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        service_name: &str,
    ) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO processed_events (event_id, service_name, processed_at)
            VALUES (?, ?, NOW(6))
            "#,
        )
        .bind(event_id)
        .bind(service_name)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(event_id = %event_id, service = %service_name, "event already recorded");
        }
        Ok(inserted)
    }
}
