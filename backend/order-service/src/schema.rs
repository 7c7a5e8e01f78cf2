//! Write-database bootstrap. Runs at startup; failure is fatal.

use sqlx::MySqlPool;
use tracing::info;

pub async fn ensure_tables(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
            user_id BIGINT UNSIGNED NOT NULL,
            status VARCHAR(16) NOT NULL,
            total_amount DOUBLE NOT NULL,
            created_at DATETIME(6) NOT NULL,
            PRIMARY KEY (id),
            KEY idx_orders_user (user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_products (
            order_id BIGINT UNSIGNED NOT NULL,
            product_id BIGINT UNSIGNED NOT NULL,
            quantity INT NOT NULL,
            unit_price DOUBLE NOT NULL,
            PRIMARY KEY (order_id, product_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS outbox (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
            aggregate VARCHAR(64) NOT NULL,
            event_type VARCHAR(64) NOT NULL,
            payload JSON NOT NULL,
            headers JSON NULL,
            created_at DATETIME(6) NOT NULL,
            processed_at DATETIME(6) NULL,
            PRIMARY KEY (id),
            KEY idx_outbox_pending (processed_at, created_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("database schema ensured");
    Ok(())
}
