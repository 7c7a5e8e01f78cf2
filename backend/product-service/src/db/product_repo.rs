use sqlx::MySqlPool;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::Product;

/// Queries against the `products` table, including the transactional stock
/// movements the order consumer relies on.
pub struct ProductRepository {
    pool: MySqlPool,
}

impl ProductRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: u64) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, stock, created_at FROM products WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or(AppError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, stock, created_at FROM products ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Atomically decrement stock. The row is locked for the read-modify-
    /// write so concurrent reservations cannot both pass the check.
    pub async fn reserve_stock(&self, product_id: u64, quantity: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let mut product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, stock, created_at FROM products WHERE id = ? FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound(product_id))?;

        product.reserve(quantity)?;

        sqlx::query("UPDATE products SET stock = ? WHERE id = ?")
            .bind(product.stock)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(product_id, quantity, remaining = product.stock, "stock reserved");
        Ok(())
    }

    /// Atomically return stock.
    pub async fn release_stock(&self, product_id: u64, quantity: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let mut product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, stock, created_at FROM products WHERE id = ? FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound(product_id))?;

        product.release(quantity);

        sqlx::query("UPDATE products SET stock = ? WHERE id = ?")
            .bind(product.stock)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(product_id, quantity, stock = product.stock, "stock released");
        Ok(())
    }
}
