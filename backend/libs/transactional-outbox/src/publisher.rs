use std::sync::Arc;

use async_trait::async_trait;
use event_schema::DomainEvent;
use kafka_bus::EventProducer;

use crate::error::{OutboxError, OutboxResult};
use crate::OutboxEntry;

/// Sink the dispatcher publishes drained entries into.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, entry: &OutboxEntry) -> OutboxResult<()>;
}

/// Kafka-backed publisher. The topic is the entry's `event_type` (identity
/// mapping) and the partition key is the aggregate id carried in the
/// payload.
pub struct BusOutboxPublisher {
    producer: Arc<EventProducer>,
}

impl BusOutboxPublisher {
    pub fn new(producer: Arc<EventProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl OutboxPublisher for BusOutboxPublisher {
    async fn publish(&self, entry: &OutboxEntry) -> OutboxResult<()> {
        let event = DomainEvent::decode(&entry.event_type, entry.payload.as_bytes())
            .map_err(|e| OutboxError::PublishFailed(e.to_string()))?;

        self.producer
            .publish_event(&event)
            .await
            .map_err(|e| OutboxError::PublishFailed(e.to_string()))
    }
}
