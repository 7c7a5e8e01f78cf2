//! Event routing for the read side.
//!
//! One consumer per topic feeds into a shared [`EventRouter`]: decode the
//! payload by topic, absorb duplicates via the Mongo-backed idempotency
//! guard, and apply the projection handlers. Handlers must tolerate
//! out-of-order arrival (an order can show up before its user); the blank
//! snapshots embedded then are back-filled by the patch handlers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use event_schema::DomainEvent;
use idempotent_consumer::{IdempotencyGuard, MongoProcessedEventStore, ProcessingResult};
use kafka_bus::MessageHandler;
use tracing::info;

use crate::projections::{OrderProjection, ProductProjection, UserProjection};

pub struct EventRouter {
    users: Arc<UserProjection>,
    products: Arc<ProductProjection>,
    orders: Arc<OrderProjection>,
    guard: IdempotencyGuard<MongoProcessedEventStore>,
}

impl EventRouter {
    pub fn new(
        users: Arc<UserProjection>,
        products: Arc<ProductProjection>,
        orders: Arc<OrderProjection>,
        guard: IdempotencyGuard<MongoProcessedEventStore>,
    ) -> Self {
        Self {
            users,
            products,
            orders,
            guard,
        }
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let event = DomainEvent::decode(topic, payload)
            .with_context(|| format!("failed to decode event on {topic}"))?;
        let event_id = event.meta().event_id.clone();

        let outcome = self
            .guard
            .process_if_new(&event_id, || self.apply(&event))
            .await?;

        match outcome {
            ProcessingResult::Applied => {
                info!(event_id = %event_id, topic = %topic, "event projected");
                Ok(())
            }
            ProcessingResult::AlreadyProcessed => {
                info!(event_id = %event_id, topic = %topic, "duplicate event skipped");
                Ok(())
            }
            ProcessingResult::Failed(message) => anyhow::bail!(message),
        }
    }

    async fn apply(&self, event: &DomainEvent) -> anyhow::Result<()> {
        match event {
            DomainEvent::UserCreated(e) => {
                self.users.handle_user_created(e).await?;
                self.orders.patch_user(&e.user).await?;
            }
            DomainEvent::UserUpdated(e) => {
                self.users.handle_user_updated(e).await?;
                self.orders.patch_user(&e.user).await?;
            }
            DomainEvent::ProductCreated(e) => {
                self.products.handle_product_created(e).await?;
                self.orders.patch_product(&e.product).await?;
            }
            DomainEvent::ProductUpdated(e) => {
                self.products.handle_product_updated(e).await?;
                self.orders.patch_product(&e.product).await?;
            }
            DomainEvent::OrderCreated(e) => {
                let user = self.users.get_by_id(e.order.user_id as i64).await?;

                let mut products = HashMap::new();
                for item in &e.order.items {
                    let product_id = item.product_id as i64;
                    if let Some(product) = self.products.get_by_id(product_id).await? {
                        products.insert(product_id, product);
                    }
                }

                self.orders.handle_order_created(e, user, products).await?;
            }
            DomainEvent::OrderPaid(e) => {
                self.orders.mark_paid(e.order_id as i64).await?;
            }
            DomainEvent::OrderCanceled(e) => {
                self.orders.mark_canceled(e.order_id as i64).await?;
            }
            DomainEvent::StockReserved(e) => {
                self.products
                    .adjust_stock(e.product_id as i64, -e.quantity)
                    .await?;
            }
            DomainEvent::StockReleased(e) => {
                self.products
                    .adjust_stock(e.product_id as i64, e.quantity)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Adapter binding one subscribed topic to the shared router.
pub struct TopicHandler {
    topic: String,
    router: Arc<EventRouter>,
}

impl TopicHandler {
    pub fn new(topic: impl Into<String>, router: Arc<EventRouter>) -> Self {
        Self {
            topic: topic.into(),
            router,
        }
    }
}

#[async_trait]
impl MessageHandler for TopicHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        self.router.dispatch(&self.topic, payload).await
    }
}
