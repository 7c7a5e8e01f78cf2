//! User service: owns the `users` aggregate and emits `user.created` /
//! `user.updated` through the transactional outbox.

pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod services;

pub use error::{AppError, Result};
