use serde::Serialize;
use sqlx::MySqlPool;

use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem};

/// An order with its items, as returned by the read endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Read-side queries against the `orders` tables. Mutations go through
/// `OrderService`, which pairs them with an outbox entry in one
/// transaction.
pub struct OrderRepository {
    pool: MySqlPool,
}

impl OrderRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: u64) -> Result<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, created_at FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound(id))?;

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT order_id, product_id, quantity, unit_price
            FROM order_products
            WHERE order_id = ?
            ORDER BY product_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(OrderWithItems { order, items })
    }

    pub async fn list(&self) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, created_at FROM orders ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
