use std::sync::Arc;

use chrono::Utc;
use event_schema::{DomainEvent, ProductCreated, ProductData, ProductUpdated};
use sqlx::{MySqlPool, Row};
use tracing::info;
use transactional_outbox::{MySqlOutboxRepository, NewOutboxEntry, OutboxRepository};

use crate::error::{AppError, Result};
use crate::models::Product;

/// Partial update applied to a product.
#[derive(Debug, Default, Clone)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
}

/// Write-side operations on the product aggregate: mutation and outbox
/// entry commit in one transaction.
pub struct ProductService {
    pool: MySqlPool,
    outbox: Arc<MySqlOutboxRepository>,
}

impl ProductService {
    pub fn new(pool: MySqlPool, outbox: Arc<MySqlOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    pub async fn create_product(&self, name: &str, price: f64, stock: i32) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let created_at = Utc::now();
        let result =
            sqlx::query("INSERT INTO products (name, price, stock, created_at) VALUES (?, ?, ?, ?)")
                .bind(name)
                .bind(price)
                .bind(stock)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;

        let product = Product {
            id: result.last_insert_id(),
            name: name.to_string(),
            price,
            stock,
            created_at,
        };

        let event = DomainEvent::from(ProductCreated::new(ProductData {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
        }));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(product_id = product.id, "product created");
        Ok(product)
    }

    /// Apply the provided fields and emit `product.updated` with the
    /// post-update snapshot.
    pub async fn update_product(&self, id: u64, changes: UpdateProduct) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT id, name, price, stock, created_at FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound(id))?;

        let mut product = Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            created_at: row.try_get("created_at")?,
        };

        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }

        sqlx::query("UPDATE products SET name = ?, price = ?, stock = ? WHERE id = ?")
            .bind(&product.name)
            .bind(product.price)
            .bind(product.stock)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let event = DomainEvent::from(ProductUpdated::new(ProductData {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
        }));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(product_id = id, "product updated");
        Ok(product)
    }
}
