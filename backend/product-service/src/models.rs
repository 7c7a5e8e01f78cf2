use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// A row in the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Take `quantity` units out of stock; fails without mutating when not
    /// enough is available.
    pub fn reserve(&mut self, quantity: i32) -> Result<(), AppError> {
        if quantity > self.stock {
            return Err(AppError::InsufficientStock {
                product_id: self.id,
            });
        }
        self.stock -= quantity;
        Ok(())
    }

    /// Return `quantity` units to stock.
    pub fn release(&mut self, quantity: i32) {
        self.stock += quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: 1,
            name: "P".to_string(),
            price: 10.0,
            stock,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reserve_exactly_available_stock_succeeds() {
        let mut p = product(2);
        p.reserve(2).unwrap();
        assert_eq!(p.stock, 0);
    }

    #[test]
    fn reserve_one_more_than_available_fails_without_mutating() {
        let mut p = product(2);
        let err = p.reserve(3).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { product_id: 1 }));
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn release_restores_stock() {
        let mut p = product(1);
        p.reserve(1).unwrap();
        p.release(1);
        assert_eq!(p.stock, 1);
    }
}
