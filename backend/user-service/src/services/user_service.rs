use std::sync::Arc;

use chrono::Utc;
use event_schema::{DomainEvent, UserCreated, UserData, UserUpdated};
use sqlx::{MySqlPool, Row};
use tracing::info;
use transactional_outbox::{MySqlOutboxRepository, NewOutboxEntry, OutboxRepository};

use crate::error::{AppError, Result};
use crate::models::User;

/// Partial update applied to a user.
#[derive(Debug, Default, Clone)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Write-side operations on the user aggregate. Every mutation writes the
/// aggregate row and its outbox entry in the same transaction and returns
/// only after commit.
pub struct UserService {
    pool: MySqlPool,
    outbox: Arc<MySqlOutboxRepository>,
}

impl UserService {
    pub fn new(pool: MySqlPool, outbox: Arc<MySqlOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    pub async fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if taken {
            return Err(AppError::EmailTaken(email.to_string()));
        }

        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (name, email, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        let user = User {
            id: result.last_insert_id(),
            name: name.to_string(),
            email: email.to_string(),
            created_at,
        };

        let event = DomainEvent::from(UserCreated::new(UserData {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }

    pub async fn update_user(&self, id: u64, changes: UpdateUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound(id))?;

        let mut user = User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            if email != user.email {
                let taken = sqlx::query("SELECT id FROM users WHERE email = ? AND id <> ?")
                    .bind(&email)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .is_some();
                if taken {
                    return Err(AppError::EmailTaken(email));
                }
                user.email = email;
            }
        }

        sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
            .bind(&user.name)
            .bind(&user.email)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let event = DomainEvent::from(UserUpdated::new(UserData {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }));
        self.outbox
            .save(&mut tx, &NewOutboxEntry::from_event(&event)?)
            .await?;

        tx.commit().await?;

        info!(user_id = id, "user updated");
        Ok(user)
    }
}
