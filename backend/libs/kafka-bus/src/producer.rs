use std::time::Duration;

use chrono::Utc;
use event_schema::{topics, DomainEvent};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BusError, BusResult};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope wrapped around a message that exhausted its retries before
/// being published to `<topic>.dlq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub original_topic: String,
    pub error_message: String,
    pub timestamp: String,
    pub original_event: String,
}

/// Kafka producer shared across tasks. Publishes JSON payloads with
/// `Content-Type` and `Timestamp` headers and returns only after the broker
/// acknowledged the write.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &[String]) -> BusResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("acks", "1")
            .set("message.timeout.ms", "30000")
            .create()?;

        Ok(Self { producer })
    }

    /// Publish a serialisable payload to a topic under the given partition
    /// key.
    pub async fn publish<T: Serialize>(&self, topic: &str, key: &str, event: &T) -> BusResult<()> {
        let payload = serde_json::to_string(event)?;
        self.publish_raw(topic, key, &payload).await
    }

    /// Publish a domain event to its canonical topic (identity mapping from
    /// event type), keyed by the aggregate id.
    pub async fn publish_event(&self, event: &DomainEvent) -> BusResult<()> {
        let payload = event.to_json()?;
        self.publish_raw(event.event_type(), &event.partition_key(), &payload)
            .await
    }

    /// Wrap a poison payload with error metadata and publish it to the
    /// topic's dead-letter counterpart.
    pub async fn publish_to_dlq(
        &self,
        original_topic: &str,
        payload: &[u8],
        error_text: &str,
    ) -> BusResult<()> {
        let message = DlqMessage {
            original_topic: original_topic.to_string(),
            error_message: error_text.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            original_event: String::from_utf8_lossy(payload).into_owned(),
        };

        let key = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        self.publish(&topics::dlq(original_topic), &key, &message)
            .await
    }

    async fn publish_raw(&self, topic: &str, key: &str, payload: &str) -> BusResult<()> {
        let sent_at = Utc::now().to_rfc3339();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "Content-Type",
                value: Some("application/json".as_bytes()),
            })
            .insert(Header {
                key: "Timestamp",
                value: Some(sent_at.as_bytes()),
            });

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(headers);

        debug!(topic = %topic, key = %key, "publishing event");

        self.producer
            .send(record, DELIVERY_TIMEOUT)
            .await
            .map_err(|(err, _)| BusError::PublishFailed {
                topic: topic.to_string(),
                message: err.to_string(),
            })?;

        info!(topic = %topic, "event published");

        Ok(())
    }

    /// Flush outstanding deliveries. Called once at shutdown.
    pub fn close(&self) {
        if let Err(e) = self.producer.flush(Duration::from_secs(10)) {
            tracing::warn!(error = %e, "failed to flush producer on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_message_keeps_raw_payload() {
        let message = DlqMessage {
            original_topic: "order.created".to_string(),
            error_message: "boom".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            original_event: "{not json".to_string(),
        };

        let json = serde_json::to_string(&message).unwrap();
        let back: DlqMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.original_topic, "order.created");
        assert_eq!(back.original_event, "{not json");
        assert!(!back.error_message.is_empty());
    }
}
