use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::error::OutboxResult;
use crate::publisher::OutboxPublisher;
use crate::repository::OutboxRepository;

const DEFAULT_BATCH_SIZE: i64 = 100;

/// Background loop draining pending outbox entries to the bus.
///
/// Every tick fetches a batch ordered by `created_at`, publishes each entry
/// and marks it processed. A failed entry is logged and left pending for
/// the next tick; the rest of the batch still runs. One instance per
/// process: `get_pending` is a plain ordered read, not a locking one.
pub struct OutboxDispatcher<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
    interval: Duration,
    batch_size: i64,
}

impl<R: OutboxRepository, P: OutboxPublisher> OutboxDispatcher<R, P> {
    pub fn new(repository: Arc<R>, publisher: Arc<P>, interval: Duration) -> Self {
        Self {
            repository,
            publisher,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Run until the shutdown channel fires; an in-flight tick completes
    /// before the loop exits.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            batch_size = self.batch_size,
            "starting outbox dispatcher"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("outbox dispatcher stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.process_pending().await {
                        Ok(0) => debug!("no pending outbox entries"),
                        Ok(count) => info!(published = count, "outbox entries dispatched"),
                        Err(e) => error!(error = %e, "failed to process pending outbox entries"),
                    }
                }
            }
        }
    }

    /// Drain one batch. Returns the number of entries published and marked.
    pub async fn process_pending(&self) -> OutboxResult<usize> {
        let entries = self.repository.get_pending(self.batch_size).await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut published = 0;
        for entry in entries {
            if let Err(e) = self.publisher.publish(&entry).await {
                error!(
                    outbox_id = entry.id,
                    event_type = %entry.event_type,
                    error = %e,
                    "failed to publish outbox entry, leaving pending"
                );
                continue;
            }

            if let Err(e) = self.repository.mark_processed(entry.id).await {
                error!(
                    outbox_id = entry.id,
                    error = %e,
                    "published entry could not be marked processed"
                );
                continue;
            }

            published += 1;
        }

        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutboxError;
    use crate::{NewOutboxEntry, OutboxEntry};
    use async_trait::async_trait;
    use chrono::Utc;
    use event_schema::{DomainEvent, OrderPaid, UserCreated, UserData};
    use sqlx::{MySql, Transaction};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory stand-in for the MySQL store.
    struct MemoryRepository {
        entries: Mutex<Vec<OutboxEntry>>,
    }

    impl MemoryRepository {
        fn new() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
            }
        }

        fn push(&self, entry: NewOutboxEntry) -> u64 {
            let mut entries = self.entries.lock().unwrap();
            let id = entries.len() as u64 + 1;
            entries.push(OutboxEntry {
                id,
                aggregate: entry.aggregate,
                event_type: entry.event_type,
                payload: entry.payload,
                headers: entry.headers,
                created_at: entry.created_at,
                processed_at: None,
            });
            id
        }
    }

    #[async_trait]
    impl OutboxRepository for MemoryRepository {
        async fn save(
            &self,
            _tx: &mut Transaction<'_, MySql>,
            entry: &NewOutboxEntry,
        ) -> OutboxResult<u64> {
            Ok(self.push(entry.clone()))
        }

        async fn get_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxEntry>> {
            let mut pending: Vec<OutboxEntry> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.processed_at.is_none())
                .cloned()
                .collect();
            pending.sort_by_key(|e| e.created_at);
            pending.truncate(limit as usize);
            Ok(pending)
        }

        async fn mark_processed(&self, id: u64) -> OutboxResult<()> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                if entry.processed_at.is_none() {
                    entry.processed_at = Some(Utc::now());
                }
            }
            Ok(())
        }

        async fn get_by_id(&self, id: u64) -> OutboxResult<OutboxEntry> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .ok_or(OutboxError::EntryNotFound(id))
        }

        async fn pending_count(&self) -> OutboxResult<i64> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.processed_at.is_none())
                .count() as i64)
        }
    }

    /// Publisher double recording topics, optionally failing chosen entries.
    struct MemoryPublisher {
        published: Mutex<Vec<String>>,
        fail_event_types: Mutex<HashSet<String>>,
    }

    impl MemoryPublisher {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_event_types: Mutex::new(HashSet::new()),
            }
        }

        fn fail_on(&self, event_type: &str) {
            self.fail_event_types
                .lock()
                .unwrap()
                .insert(event_type.to_string());
        }

        fn recover(&self, event_type: &str) {
            self.fail_event_types.lock().unwrap().remove(event_type);
        }
    }

    #[async_trait]
    impl OutboxPublisher for MemoryPublisher {
        async fn publish(&self, entry: &OutboxEntry) -> OutboxResult<()> {
            if self.fail_event_types.lock().unwrap().contains(&entry.event_type) {
                return Err(OutboxError::PublishFailed("broker unavailable".into()));
            }
            self.published.lock().unwrap().push(entry.event_type.clone());
            Ok(())
        }
    }

    fn entry_for(event: DomainEvent) -> NewOutboxEntry {
        NewOutboxEntry::from_event(&event).unwrap()
    }

    fn dispatcher(
        repo: &Arc<MemoryRepository>,
        publisher: &Arc<MemoryPublisher>,
    ) -> OutboxDispatcher<MemoryRepository, MemoryPublisher> {
        OutboxDispatcher::new(repo.clone(), publisher.clone(), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn saved_entries_are_pending_until_marked() {
        let repo = Arc::new(MemoryRepository::new());
        let id = repo.push(entry_for(DomainEvent::from(OrderPaid::new(1))));

        let pending = repo.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        repo.mark_processed(id).await.unwrap();
        assert!(repo.get_pending(10).await.unwrap().is_empty());
        assert!(repo.get_by_id(id).await.unwrap().is_processed());

        // Re-marking keeps the original timestamp.
        let first = repo.get_by_id(id).await.unwrap().processed_at;
        repo.mark_processed(id).await.unwrap();
        assert_eq!(repo.get_by_id(id).await.unwrap().processed_at, first);
    }

    #[tokio::test]
    async fn drains_in_created_at_order() {
        let repo = Arc::new(MemoryRepository::new());
        let publisher = Arc::new(MemoryPublisher::new());

        repo.push(entry_for(DomainEvent::from(UserCreated::new(UserData {
            id: 1,
            name: "A".into(),
            email: "a@x".into(),
        }))));
        repo.push(entry_for(DomainEvent::from(OrderPaid::new(1))));

        let count = dispatcher(&repo, &publisher).process_pending().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec!["user.created".to_string(), "order.paid".to_string()]
        );
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let repo = Arc::new(MemoryRepository::new());
        let publisher = Arc::new(MemoryPublisher::new());
        assert_eq!(dispatcher(&repo, &publisher).process_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_entry_stays_pending_and_batch_continues() {
        let repo = Arc::new(MemoryRepository::new());
        let publisher = Arc::new(MemoryPublisher::new());
        publisher.fail_on("user.created");

        repo.push(entry_for(DomainEvent::from(UserCreated::new(UserData {
            id: 1,
            name: "A".into(),
            email: "a@x".into(),
        }))));
        repo.push(entry_for(DomainEvent::from(OrderPaid::new(1))));

        let d = dispatcher(&repo, &publisher);
        let count = d.process_pending().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(repo.pending_count().await.unwrap(), 1);

        // Next tick retries the failed entry once the broker recovers.
        publisher.recover("user.created");
        assert_eq!(d.process_pending().await.unwrap(), 1);
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_size_bounds_the_drain() {
        let repo = Arc::new(MemoryRepository::new());
        let publisher = Arc::new(MemoryPublisher::new());
        for i in 0..5u64 {
            repo.push(entry_for(DomainEvent::from(OrderPaid::new(i))));
        }

        let d = dispatcher(&repo, &publisher).with_batch_size(3);
        assert_eq!(d.process_pending().await.unwrap(), 3);
        assert_eq!(repo.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let repo = Arc::new(MemoryRepository::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let d = dispatcher(&repo, &publisher);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { d.run(rx).await });
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
    }
}
