//! Event schema shared by every Orderflow service.
//!
//! Each domain event carries a base envelope (`event_id`, `occurred_at`)
//! flattened into its JSON body, plus a typed payload. The event type is a
//! dotted string ("order.created") which doubles as the Kafka topic name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod events;
pub mod topics;

pub use events::{
    DomainEvent, EventDecodeError, OrderCanceled, OrderCreated, OrderPaid, ProductCreated,
    ProductUpdated, StockReleased, StockReserved, UserCreated, UserUpdated,
};

/// Base envelope shared by all events.
///
/// `event_id` is assigned exactly once at construction and is the
/// idempotency key downstream consumers deduplicate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// User snapshot embedded in user events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Product snapshot embedded in product events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub stock: i32,
}

/// Order snapshot embedded in `order.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub id: u64,
    pub user_id: u64,
    pub status: String,
    pub total_amount: f64,
    pub items: Vec<OrderItemData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemData {
    pub product_id: u64,
    pub quantity: i32,
    pub unit_price: f64,
}
