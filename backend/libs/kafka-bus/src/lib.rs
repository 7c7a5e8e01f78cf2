//! Kafka plumbing shared by every service: a JSON event producer with DLQ
//! support and a per-topic consumer loop with retry, exponential backoff
//! and dead-lettering.
//!
//! Delivery is at-least-once. The consumer commits an offset only after the
//! handler succeeded or the message was routed to the DLQ, so a crash
//! mid-processing redelivers; duplicate deliveries are absorbed downstream
//! by the idempotency layer.

mod consumer;
mod error;
mod producer;

pub use consumer::{EventConsumer, MessageHandler, RetryPolicy};
pub use error::{BusError, BusResult};
pub use producer::{DlqMessage, EventProducer};
