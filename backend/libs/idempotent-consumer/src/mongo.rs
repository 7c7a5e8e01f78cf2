use async_trait::async_trait;
use mongodb::bson::{doc, DateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IdempotencyResult;
use crate::ProcessedEventStore;

const COLLECTION: &str = "processed_events";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
struct ProcessedEventDoc {
    event_id: String,
    service_name: String,
    processed_at: DateTime,
}

/// Processed-event store backed by the read-model document database.
#[derive(Clone)]
pub struct MongoProcessedEventStore {
    collection: Collection<ProcessedEventDoc>,
}

impl MongoProcessedEventStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(COLLECTION),
        }
    }

    /// Create the unique `(event_id, service_name)` index the race guard
    /// depends on. Called once at startup.
    pub async fn ensure_indexes(&self) -> IdempotencyResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "event_id": 1, "service_name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}

#[async_trait]
impl ProcessedEventStore for MongoProcessedEventStore {
    async fn is_processed(&self, event_id: &str, service_name: &str) -> IdempotencyResult<bool> {
        let count = self
            .collection
            .count_documents(
                doc! { "event_id": event_id, "service_name": service_name },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        service_name: &str,
    ) -> IdempotencyResult<bool> {
        let document = ProcessedEventDoc {
            event_id: event_id.to_string(),
            service_name: service_name.to_string(),
            processed_at: DateTime::now(),
        };

        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => {
                debug!(event_id = %event_id, service = %service_name, "event already recorded");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
