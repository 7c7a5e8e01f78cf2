//! Idempotency layer absorbing duplicate event deliveries.
//!
//! Each consumer records the `(event_id, service_name)` pairs it has
//! applied; at-least-once delivery from the bus then collapses to
//! effectively-once side effects. The record can live in the consumer's
//! relational database (write-side services) or in the document store
//! (read-side services); both backends rely on a unique key so concurrent
//! duplicates race on the insert, not on application code.

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, warn};

mod error;
mod mongo;
mod mysql;

pub use error::{IdempotencyError, IdempotencyResult};
pub use mongo::MongoProcessedEventStore;
pub use mysql::MySqlProcessedEventStore;

/// Persistent set of processed `(event_id, service_name)` pairs.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn is_processed(&self, event_id: &str, service_name: &str) -> IdempotencyResult<bool>;

    /// Record the pair. Returns `false` when it already existed: the
    /// unique-key collision is the race guard, so the caller treats that
    /// as a successful no-op.
    async fn mark_processed(&self, event_id: &str, service_name: &str)
        -> IdempotencyResult<bool>;
}

/// Result of running a handler through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// The handler ran and the event was recorded.
    Applied,
    /// The event had already been processed by this service.
    AlreadyProcessed,
    /// The handler failed; the event stays unrecorded so redelivery
    /// retries it.
    Failed(String),
}

/// Wraps a handler with the processed-event check for one consumer.
pub struct IdempotencyGuard<S> {
    store: S,
    service_name: String,
}

impl<S: ProcessedEventStore> IdempotencyGuard<S> {
    pub fn new(store: S, service_name: impl Into<String>) -> Self {
        Self {
            store,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run `process` unless the event was already applied, then record it.
    pub async fn process_if_new<F, Fut>(
        &self,
        event_id: &str,
        process: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        validate_event_id(event_id)?;

        if self.store.is_processed(event_id, &self.service_name).await? {
            debug!(event_id = %event_id, service = %self.service_name, "duplicate event skipped");
            return Ok(ProcessingResult::AlreadyProcessed);
        }

        match process().await {
            Ok(()) => {
                self.store
                    .mark_processed(event_id, &self.service_name)
                    .await?;
                Ok(ProcessingResult::Applied)
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    service = %self.service_name,
                    error = ?e,
                    "event processing failed"
                );
                Ok(ProcessingResult::Failed(e.to_string()))
            }
        }
    }
}

fn validate_event_id(event_id: &str) -> IdempotencyResult<()> {
    if event_id.is_empty() {
        return Err(IdempotencyError::InvalidEventId(
            "event id cannot be empty".to_string(),
        ));
    }
    if event_id.len() > 255 {
        return Err(IdempotencyError::InvalidEventId(format!(
            "event id too long: {} characters (max 255)",
            event_id.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        seen: Mutex<HashSet<(String, String)>>,
    }

    #[async_trait]
    impl ProcessedEventStore for MemoryStore {
        async fn is_processed(
            &self,
            event_id: &str,
            service_name: &str,
        ) -> IdempotencyResult<bool> {
            Ok(self
                .seen
                .lock()
                .unwrap()
                .contains(&(event_id.to_string(), service_name.to_string())))
        }

        async fn mark_processed(
            &self,
            event_id: &str,
            service_name: &str,
        ) -> IdempotencyResult<bool> {
            Ok(self
                .seen
                .lock()
                .unwrap()
                .insert((event_id.to_string(), service_name.to_string())))
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_is_absorbed() {
        let guard = IdempotencyGuard::new(MemoryStore::default(), "query-consumer");
        let applied = AtomicU32::new(0);

        let first = guard
            .process_if_new("evt-1", || async {
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        let second = guard
            .process_if_new("evt-1", || async {
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(first, ProcessingResult::Applied);
        assert_eq!(second, ProcessingResult::AlreadyProcessed);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_event_different_services_both_apply() {
        let store = MemoryStore::default();
        assert!(store.mark_processed("evt-1", "query-consumer").await.unwrap());
        assert!(store.mark_processed("evt-1", "product-service").await.unwrap());
        assert!(!store.mark_processed("evt-1", "query-consumer").await.unwrap());
    }

    #[tokio::test]
    async fn failed_handler_leaves_event_unrecorded() {
        let guard = IdempotencyGuard::new(MemoryStore::default(), "query-consumer");

        let result = guard
            .process_if_new("evt-2", || async { anyhow::bail!("projection unavailable") })
            .await
            .unwrap();
        assert!(matches!(result, ProcessingResult::Failed(_)));

        // Redelivery runs the handler again.
        let result = guard
            .process_if_new("evt-2", || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(result, ProcessingResult::Applied);
    }

    #[tokio::test]
    async fn invalid_event_ids_are_rejected() {
        let guard = IdempotencyGuard::new(MemoryStore::default(), "query-consumer");

        let err = guard.process_if_new("", || async { Ok(()) }).await;
        assert!(matches!(err, Err(IdempotencyError::InvalidEventId(_))));

        let long_id = "x".repeat(256);
        let err = guard.process_if_new(&long_id, || async { Ok(()) }).await;
        assert!(matches!(err, Err(IdempotencyError::InvalidEventId(_))));
    }
}
