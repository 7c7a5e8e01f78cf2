use sqlx::MySqlPool;

use crate::error::{AppError, Result};
use crate::models::User;

/// Read-side queries against the `users` table. Mutations go through
/// `UserService`, which pairs them with an outbox entry in one transaction.
pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: u64) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(AppError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
