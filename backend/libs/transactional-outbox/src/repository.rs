use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::debug;

use crate::error::{OutboxError, OutboxResult};
use crate::{NewOutboxEntry, OutboxEntry};

/// Operations on the outbox store.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Insert an entry on the caller's transaction so the event commits (or
    /// rolls back) together with the aggregate mutation. Returns the
    /// database-assigned id.
    async fn save(
        &self,
        tx: &mut Transaction<'_, MySql>,
        entry: &NewOutboxEntry,
    ) -> OutboxResult<u64>;

    /// Pending entries (null `processed_at`), oldest first.
    async fn get_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxEntry>>;

    /// Stamp `processed_at`. Idempotent: re-marking a processed entry is a
    /// no-op and keeps the original timestamp.
    async fn mark_processed(&self, id: u64) -> OutboxResult<()>;

    async fn get_by_id(&self, id: u64) -> OutboxResult<OutboxEntry>;

    async fn pending_count(&self) -> OutboxResult<i64>;
}

/// MySQL-backed outbox store.
pub struct MySqlOutboxRepository {
    pool: MySqlPool,
}

impl MySqlOutboxRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: MySqlRow) -> Result<OutboxEntry, sqlx::Error> {
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        aggregate: row.try_get("aggregate")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        headers: row.try_get("headers")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

#[async_trait]
impl OutboxRepository for MySqlOutboxRepository {
    async fn save(
        &self,
        tx: &mut Transaction<'_, MySql>,
        entry: &NewOutboxEntry,
    ) -> OutboxResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO outbox (aggregate, event_type, payload, headers, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.aggregate)
        .bind(&entry.event_type)
        .bind(&entry.payload)
        .bind(&entry.headers)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        let id = result.last_insert_id();
        debug!(outbox_id = id, event_type = %entry.event_type, "event enqueued in outbox");
        Ok(id)
    }

    async fn get_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxEntry>> {
        // JSON columns come back as text so the payload round-trips
        // byte-for-byte into the decoder.
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate, event_type,
                   CAST(payload AS CHAR) AS payload,
                   CAST(headers AS CHAR) AS headers,
                   created_at, processed_at
            FROM outbox
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(count = entries.len(), "fetched pending outbox entries");
        Ok(entries)
    }

    async fn mark_processed(&self, id: u64) -> OutboxResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET processed_at = NOW(6)
            WHERE id = ? AND processed_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(outbox_id = id, "outbox entry marked processed");
        Ok(())
    }

    async fn get_by_id(&self, id: u64) -> OutboxResult<OutboxEntry> {
        let row = sqlx::query(
            r#"
            SELECT id, aggregate, event_type,
                   CAST(payload AS CHAR) AS payload,
                   CAST(headers AS CHAR) AS headers,
                   created_at, processed_at
            FROM outbox
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_entry(row)?),
            None => Err(OutboxError::EntryNotFound(id)),
        }
    }

    async fn pending_count(&self) -> OutboxResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS pending FROM outbox WHERE processed_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("pending")?)
    }
}
