//! Transactional outbox: domain mutations and the events they emit commit
//! in one database transaction; a background dispatcher drains committed
//! rows to Kafka afterwards.
//!
//! The store is the [`OutboxRepository`] trait; [`OutboxRepository::save`]
//! MUST be called on the caller's open transaction. Both the write path
//! and the dispatcher ([`OutboxDispatcher`]) go through the trait, so each
//! can be exercised against in-memory doubles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod dispatcher;
mod error;
mod publisher;
mod repository;

pub use dispatcher::OutboxDispatcher;
pub use error::{OutboxError, OutboxResult};
pub use publisher::{BusOutboxPublisher, OutboxPublisher};
pub use repository::{MySqlOutboxRepository, OutboxRepository};

/// A row in the `outbox` table.
///
/// `processed_at` is null while the entry is pending; once the dispatcher
/// published the event the timestamp is set and never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: u64,
    pub aggregate: String,
    pub event_type: String,
    /// Serialised event envelope (JSON text).
    pub payload: String,
    pub headers: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// An entry about to be inserted; the `id` is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewOutboxEntry {
    pub aggregate: String,
    pub event_type: String,
    pub payload: String,
    pub headers: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxEntry {
    /// Build an outbox entry from a domain event.
    pub fn from_event(event: &event_schema::DomainEvent) -> serde_json::Result<Self> {
        Ok(Self {
            aggregate: event.aggregate().to_string(),
            event_type: event.event_type().to_string(),
            payload: event.to_json()?,
            headers: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_schema::{DomainEvent, OrderPaid};

    #[test]
    fn entry_from_event_carries_type_and_payload() {
        let event = DomainEvent::from(OrderPaid::new(9));
        let entry = NewOutboxEntry::from_event(&event).unwrap();

        assert_eq!(entry.aggregate, "order");
        assert_eq!(entry.event_type, "order.paid");
        assert!(entry.headers.is_none());

        let decoded = DomainEvent::decode(&entry.event_type, entry.payload.as_bytes()).unwrap();
        assert_eq!(decoded, event);
    }
}
