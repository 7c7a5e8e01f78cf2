//! Write-database bootstrap. Runs at startup; failure is fatal.

use sqlx::MySqlPool;
use tracing::info;

pub async fn ensure_tables(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
            name VARCHAR(255) NOT NULL,
            price DOUBLE NOT NULL,
            stock INT NOT NULL,
            created_at DATETIME(6) NOT NULL,
            PRIMARY KEY (id)
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

    // The order.created consumer records applied events here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_events (
            event_id VARCHAR(64) NOT NULL,
            service_name VARCHAR(64) NOT NULL,
            processed_at DATETIME(6) NOT NULL,
            PRIMARY KEY (event_id, service_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("database schema ensured");
    Ok(())
}
