use std::sync::Arc;

use chrono::Utc;
use event_schema::{
    DomainEvent, OrderCanceled, OrderCreated, OrderData, OrderItemData, OrderPaid,
};
use sqlx::{MySqlPool, Row};
use tracing::info;
use transactional_outbox::{MySqlOutboxRepository, NewOutboxEntry, OutboxRepository};

use crate::error::{AppError, Result};
use crate::models::{self, NewOrderItem, Order, OrderItem, OrderStatus};

/// Write-side operations on the order aggregate. Every mutation writes the
/// aggregate rows and the outbox entry in one transaction and returns only
/// after commit.
pub struct OrderService {
    pool: MySqlPool,
    outbox: Arc<MySqlOutboxRepository>,
}

impl OrderService {
    pub fn new(pool: MySqlPool, outbox: Arc<MySqlOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    pub async fn create_order(
        &self,
        user_id: u64,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Vec<OrderItem>)> {
        if items.is_empty() {
            return Err(AppError::Validation("order must have at least one item".into()));
        }

        let mut tx = self.pool.begin().await?;

        let created_at = Utc::now();
        let total = models::total_amount(&items);
        let result = sqlx::query(
            "INSERT INTO orders (user_id, status, total_amount, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(OrderStatus::Created.as_str())
        .bind(total)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
        let order_id = result.last_insert_id();

        let mut order_items = Vec::with_capacity(items.len());
        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_products (order_id, product_id, quantity, unit_price)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;

            order_items.push(OrderItem {
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let order = Order {
            id: order_id,
            user_id,
            status: OrderStatus::Created,
            total_amount: total,
            created_at,
        };

        let event = DomainEvent::from(OrderCreated::new(OrderData {
            id: order.id,
            user_id: order.user_id,
            status: order.status.as_str().to_string(),
            total_amount: order.total_amount,
            items: order_items
                .iter()
                .map(|item| OrderItemData {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(order_id, user_id, total_amount = total, "order created");
        Ok((order, order_items))
    }

    pub async fn pay_order(&self, id: u64) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = self.load_for_update(&mut tx, id).await?;
        order.pay()?;

        sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(order.status.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let event = DomainEvent::from(OrderPaid::new(id));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(order_id = id, "order paid");
        Ok(order)
    }

    pub async fn cancel_order(&self, id: u64, reason: Option<String>) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = self.load_for_update(&mut tx, id).await?;
        order.cancel()?;

        sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(order.status.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let event = DomainEvent::from(OrderCanceled::new(id, reason));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(order_id = id, "order canceled");
        Ok(order)
    }

    async fn load_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        id: u64,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, total_amount, created_at
            FROM orders
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound(id))?;

        Ok(Order {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            total_amount: row.try_get("total_amount")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
