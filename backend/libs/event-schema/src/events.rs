//! Domain event definitions.
//!
//! Events are a closed set: one struct per event type, each flattening the
//! [`EventMeta`] envelope into its body, and a [`DomainEvent`] enum used
//! wherever code needs to handle "any event". Decoding is a table lookup
//! from the event type (topic name) to the concrete variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{topics, EventMeta, OrderData, ProductData, UserData};

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("unknown event type: {0}")]
    UnknownType(String),

    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub user: UserData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub user: UserData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreated {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub product: ProductData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdated {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub product: ProductData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub order: OrderData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaid {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub order_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceled {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub order_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReserved {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub order_id: u64,
    pub product_id: u64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReleased {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub order_id: u64,
    pub product_id: u64,
    pub quantity: i32,
}

impl UserCreated {
    pub fn new(user: UserData) -> Self {
        Self {
            meta: EventMeta::new(),
            user,
        }
    }
}

impl UserUpdated {
    pub fn new(user: UserData) -> Self {
        Self {
            meta: EventMeta::new(),
            user,
        }
    }
}

impl ProductCreated {
    pub fn new(product: ProductData) -> Self {
        Self {
            meta: EventMeta::new(),
            product,
        }
    }
}

impl ProductUpdated {
    pub fn new(product: ProductData) -> Self {
        Self {
            meta: EventMeta::new(),
            product,
        }
    }
}

impl OrderCreated {
    pub fn new(order: OrderData) -> Self {
        Self {
            meta: EventMeta::new(),
            order,
        }
    }
}

impl OrderPaid {
    pub fn new(order_id: u64) -> Self {
        Self {
            meta: EventMeta::new(),
            order_id,
        }
    }
}

impl OrderCanceled {
    pub fn new(order_id: u64, reason: Option<String>) -> Self {
        Self {
            meta: EventMeta::new(),
            order_id,
            reason,
        }
    }
}

impl StockReserved {
    pub fn new(order_id: u64, product_id: u64, quantity: i32) -> Self {
        Self {
            meta: EventMeta::new(),
            order_id,
            product_id,
            quantity,
        }
    }
}

impl StockReleased {
    pub fn new(order_id: u64, product_id: u64, quantity: i32) -> Self {
        Self {
            meta: EventMeta::new(),
            order_id,
            product_id,
            quantity,
        }
    }
}

/// Closed enumeration of every event the system emits.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    UserCreated(UserCreated),
    UserUpdated(UserUpdated),
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    OrderCreated(OrderCreated),
    OrderPaid(OrderPaid),
    OrderCanceled(OrderCanceled),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
}

impl DomainEvent {
    /// Dotted event type; also the Kafka topic the event is published to.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::UserCreated(_) => topics::USER_CREATED,
            DomainEvent::UserUpdated(_) => topics::USER_UPDATED,
            DomainEvent::ProductCreated(_) => topics::PRODUCT_CREATED,
            DomainEvent::ProductUpdated(_) => topics::PRODUCT_UPDATED,
            DomainEvent::OrderCreated(_) => topics::ORDER_CREATED,
            DomainEvent::OrderPaid(_) => topics::ORDER_PAID,
            DomainEvent::OrderCanceled(_) => topics::ORDER_CANCELED,
            DomainEvent::StockReserved(_) => topics::STOCK_RESERVED,
            DomainEvent::StockReleased(_) => topics::STOCK_RELEASED,
        }
    }

    /// Aggregate tag recorded on outbox rows.
    pub fn aggregate(&self) -> &'static str {
        match self {
            DomainEvent::UserCreated(_) | DomainEvent::UserUpdated(_) => "user",
            DomainEvent::ProductCreated(_) | DomainEvent::ProductUpdated(_) => "product",
            DomainEvent::OrderCreated(_)
            | DomainEvent::OrderPaid(_)
            | DomainEvent::OrderCanceled(_) => "order",
            DomainEvent::StockReserved(_) | DomainEvent::StockReleased(_) => "stock",
        }
    }

    /// Partition key grouping related events onto one partition.
    ///
    /// Aggregate-scoped events key on the aggregate id; stock movements key
    /// on the product they touch, which is the stream their consumers need
    /// ordered.
    pub fn partition_key(&self) -> String {
        match self {
            DomainEvent::UserCreated(e) => e.user.id.to_string(),
            DomainEvent::UserUpdated(e) => e.user.id.to_string(),
            DomainEvent::ProductCreated(e) => e.product.id.to_string(),
            DomainEvent::ProductUpdated(e) => e.product.id.to_string(),
            DomainEvent::OrderCreated(e) => e.order.id.to_string(),
            DomainEvent::OrderPaid(e) => e.order_id.to_string(),
            DomainEvent::OrderCanceled(e) => e.order_id.to_string(),
            DomainEvent::StockReserved(e) => e.product_id.to_string(),
            DomainEvent::StockReleased(e) => e.product_id.to_string(),
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            DomainEvent::UserCreated(e) => &e.meta,
            DomainEvent::UserUpdated(e) => &e.meta,
            DomainEvent::ProductCreated(e) => &e.meta,
            DomainEvent::ProductUpdated(e) => &e.meta,
            DomainEvent::OrderCreated(e) => &e.meta,
            DomainEvent::OrderPaid(e) => &e.meta,
            DomainEvent::OrderCanceled(e) => &e.meta,
            DomainEvent::StockReserved(e) => &e.meta,
            DomainEvent::StockReleased(e) => &e.meta,
        }
    }

    /// Serialise the event body. The type tag travels out of band (topic
    /// name, outbox `event_type` column), never inside the JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            DomainEvent::UserCreated(e) => serde_json::to_string(e),
            DomainEvent::UserUpdated(e) => serde_json::to_string(e),
            DomainEvent::ProductCreated(e) => serde_json::to_string(e),
            DomainEvent::ProductUpdated(e) => serde_json::to_string(e),
            DomainEvent::OrderCreated(e) => serde_json::to_string(e),
            DomainEvent::OrderPaid(e) => serde_json::to_string(e),
            DomainEvent::OrderCanceled(e) => serde_json::to_string(e),
            DomainEvent::StockReserved(e) => serde_json::to_string(e),
            DomainEvent::StockReleased(e) => serde_json::to_string(e),
        }
    }

    /// Decode a payload given its event type.
    pub fn decode(event_type: &str, payload: &[u8]) -> Result<Self, EventDecodeError> {
        let event = match event_type {
            topics::USER_CREATED => DomainEvent::UserCreated(serde_json::from_slice(payload)?),
            topics::USER_UPDATED => DomainEvent::UserUpdated(serde_json::from_slice(payload)?),
            topics::PRODUCT_CREATED => {
                DomainEvent::ProductCreated(serde_json::from_slice(payload)?)
            }
            topics::PRODUCT_UPDATED => {
                DomainEvent::ProductUpdated(serde_json::from_slice(payload)?)
            }
            topics::ORDER_CREATED => DomainEvent::OrderCreated(serde_json::from_slice(payload)?),
            topics::ORDER_PAID => DomainEvent::OrderPaid(serde_json::from_slice(payload)?),
            topics::ORDER_CANCELED => DomainEvent::OrderCanceled(serde_json::from_slice(payload)?),
            topics::STOCK_RESERVED => DomainEvent::StockReserved(serde_json::from_slice(payload)?),
            topics::STOCK_RELEASED => DomainEvent::StockReleased(serde_json::from_slice(payload)?),
            other => return Err(EventDecodeError::UnknownType(other.to_string())),
        };
        Ok(event)
    }
}

impl From<UserCreated> for DomainEvent {
    fn from(e: UserCreated) -> Self {
        DomainEvent::UserCreated(e)
    }
}

impl From<UserUpdated> for DomainEvent {
    fn from(e: UserUpdated) -> Self {
        DomainEvent::UserUpdated(e)
    }
}

impl From<ProductCreated> for DomainEvent {
    fn from(e: ProductCreated) -> Self {
        DomainEvent::ProductCreated(e)
    }
}

impl From<ProductUpdated> for DomainEvent {
    fn from(e: ProductUpdated) -> Self {
        DomainEvent::ProductUpdated(e)
    }
}

impl From<OrderCreated> for DomainEvent {
    fn from(e: OrderCreated) -> Self {
        DomainEvent::OrderCreated(e)
    }
}

impl From<OrderPaid> for DomainEvent {
    fn from(e: OrderPaid) -> Self {
        DomainEvent::OrderPaid(e)
    }
}

impl From<OrderCanceled> for DomainEvent {
    fn from(e: OrderCanceled) -> Self {
        DomainEvent::OrderCanceled(e)
    }
}

impl From<StockReserved> for DomainEvent {
    fn from(e: StockReserved) -> Self {
        DomainEvent::StockReserved(e)
    }
}

impl From<StockReleased> for DomainEvent {
    fn from(e: StockReleased) -> Self {
        DomainEvent::StockReleased(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrderItemData;

    fn sample_order() -> OrderData {
        OrderData {
            id: 1,
            user_id: 7,
            status: "CREATED".to_string(),
            total_amount: 20.0,
            items: vec![OrderItemData {
                product_id: 3,
                quantity: 2,
                unit_price: 10.0,
            }],
        }
    }

    #[test]
    fn event_id_assigned_once() {
        let a = EventMeta::new();
        let b = EventMeta::new();
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.event_id.len(), 36);
    }

    #[test]
    fn round_trip_every_variant() {
        let events: Vec<DomainEvent> = vec![
            UserCreated::new(UserData {
                id: 1,
                name: "A".into(),
                email: "a@x".into(),
            })
            .into(),
            UserUpdated::new(UserData {
                id: 1,
                name: "B".into(),
                email: "b@x".into(),
            })
            .into(),
            ProductCreated::new(ProductData {
                id: 3,
                name: "P".into(),
                price: 10.0,
                stock: 5,
            })
            .into(),
            ProductUpdated::new(ProductData {
                id: 3,
                name: "P2".into(),
                price: 12.0,
                stock: 4,
            })
            .into(),
            OrderCreated::new(sample_order()).into(),
            OrderPaid::new(1).into(),
            OrderCanceled::new(1, Some("insufficient stock for product 3".into())).into(),
            StockReserved::new(1, 3, 2).into(),
            StockReleased::new(1, 3, 2).into(),
        ];

        for event in events {
            let json = event.to_json().unwrap();
            let decoded = DomainEvent::decode(event.event_type(), json.as_bytes()).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn envelope_fields_are_flattened() {
        let event = OrderPaid::new(42);
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event_id"], event.meta.event_id.as_str());
        assert!(value["occurred_at"].is_string());
        assert_eq!(value["order_id"], 42);
    }

    #[test]
    fn missing_event_id_is_rejected() {
        let err = DomainEvent::decode(topics::ORDER_PAID, br#"{"order_id": 1}"#);
        assert!(matches!(err, Err(EventDecodeError::Malformed(_))));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = DomainEvent::decode("order.exploded", b"{}");
        assert!(matches!(err, Err(EventDecodeError::UnknownType(_))));
    }

    #[test]
    fn cancel_reason_is_omitted_when_absent() {
        let event = OrderCanceled::new(1, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("reason"));

        let with_reason = OrderCanceled::new(1, Some("late".into()));
        let json = serde_json::to_string(&with_reason).unwrap();
        assert!(json.contains(r#""reason":"late""#));
    }

    #[test]
    fn partition_keys_follow_the_aggregate() {
        assert_eq!(
            DomainEvent::from(OrderCreated::new(sample_order())).partition_key(),
            "1"
        );
        assert_eq!(DomainEvent::from(StockReserved::new(1, 3, 2)).partition_key(), "3");
        assert_eq!(
            DomainEvent::from(UserCreated::new(UserData {
                id: 9,
                name: "A".into(),
                email: "a@x".into(),
            }))
            .partition_key(),
            "9"
        );
    }

    #[test]
    fn aggregate_tags() {
        assert_eq!(DomainEvent::from(OrderPaid::new(1)).aggregate(), "order");
        assert_eq!(DomainEvent::from(StockReleased::new(1, 2, 3)).aggregate(), "stock");
    }
}
