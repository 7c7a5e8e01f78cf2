//! Reactive side of the product service: reserve stock when an order is
//! created.
//!
//! For each order item the handler attempts an atomic stock decrement and
//! publishes `stock.reserved`; the first shortage publishes
//! `order.canceled` instead and stops. A shortage is a business outcome,
//! so the event is still recorded as processed and redelivery does not
//! re-run the reservation. Only transient failures (database, broker)
//! bubble up into the consumer's retry budget.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use event_schema::{DomainEvent, OrderCanceled, OrderCreated, StockReserved};
use idempotent_consumer::{
    IdempotencyGuard, MySqlProcessedEventStore, ProcessingResult,
};
use kafka_bus::{EventProducer, MessageHandler};
use tracing::{info, warn};

use crate::db::ProductRepository;
use crate::error::AppError;

pub struct OrderCreatedHandler {
    products: Arc<ProductRepository>,
    producer: Arc<EventProducer>,
    guard: IdempotencyGuard<MySqlProcessedEventStore>,
}

impl OrderCreatedHandler {
    pub fn new(
        products: Arc<ProductRepository>,
        producer: Arc<EventProducer>,
        guard: IdempotencyGuard<MySqlProcessedEventStore>,
    ) -> Self {
        Self {
            products,
            producer,
            guard,
        }
    }

    async fn apply(&self, event: &OrderCreated) -> anyhow::Result<()> {
        for item in &event.order.items {
            match self
                .products
                .reserve_stock(item.product_id, item.quantity)
                .await
            {
                Ok(()) => {
                    let reserved = DomainEvent::from(StockReserved::new(
                        event.order.id,
                        item.product_id,
                        item.quantity,
                    ));
                    self.producer.publish_event(&reserved).await?;
                    info!(
                        order_id = event.order.id,
                        product_id = item.product_id,
                        quantity = item.quantity,
                        "stock reserved"
                    );
                }
                Err(AppError::InsufficientStock { product_id })
                | Err(AppError::NotFound(product_id)) => {
                    warn!(
                        order_id = event.order.id,
                        product_id,
                        quantity = item.quantity,
                        "stock reservation failed, canceling order"
                    );
                    let canceled = DomainEvent::from(OrderCanceled::new(
                        event.order.id,
                        Some(format!("insufficient stock for product {product_id}")),
                    ));
                    self.producer.publish_event(&canceled).await?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for OrderCreatedHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let event: OrderCreated =
            serde_json::from_slice(payload).context("malformed order.created event")?;

        let outcome = self
            .guard
            .process_if_new(&event.meta.event_id, || self.apply(&event))
            .await?;

        match outcome {
            ProcessingResult::Applied => {
                info!(
                    event_id = %event.meta.event_id,
                    order_id = event.order.id,
                    "order.created processed"
                );
                Ok(())
            }
            ProcessingResult::AlreadyProcessed => {
                info!(event_id = %event.meta.event_id, "duplicate order.created skipped");
                Ok(())
            }
            ProcessingResult::Failed(message) => anyhow::bail!(message),
        }
    }
}
