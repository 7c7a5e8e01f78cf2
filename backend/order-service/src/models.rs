use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Order lifecycle. `CREATED → PAID` and `CREATED → CANCELED` are the only
/// transitions; `PAID` and `CANCELED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Created,
    Paid,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

/// A row in the `orders` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn pay(&mut self) -> Result<(), AppError> {
        match self.status {
            OrderStatus::Created => {
                self.status = OrderStatus::Paid;
                Ok(())
            }
            other => Err(AppError::IllegalTransition {
                order_id: self.id,
                status: other.as_str().to_string(),
            }),
        }
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        match self.status {
            OrderStatus::Canceled => Err(AppError::AlreadyCanceled(self.id)),
            OrderStatus::Paid => Err(AppError::PaidNotCancellable(self.id)),
            OrderStatus::Created => {
                self.status = OrderStatus::Canceled;
                Ok(())
            }
        }
    }
}

/// A row in the `order_products` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub order_id: u64,
    pub product_id: u64,
    pub quantity: i32,
    pub unit_price: f64,
}

/// An item of an order being created, before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: u64,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Order total: sum of quantity × unit price over the items.
pub fn total_amount(items: &[NewOrderItem]) -> f64 {
    items
        .iter()
        .map(|item| item.quantity as f64 * item.unit_price)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 1,
            user_id: 7,
            status,
            total_amount: 20.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn created_order_can_be_paid() {
        let mut o = order(OrderStatus::Created);
        o.pay().unwrap();
        assert_eq!(o.status, OrderStatus::Paid);
    }

    #[test]
    fn paid_and_canceled_are_terminal_for_pay() {
        let mut paid = order(OrderStatus::Paid);
        assert!(matches!(
            paid.pay(),
            Err(AppError::IllegalTransition { .. })
        ));

        let mut canceled = order(OrderStatus::Canceled);
        assert!(matches!(
            canceled.pay(),
            Err(AppError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn created_order_can_be_canceled() {
        let mut o = order(OrderStatus::Created);
        o.cancel().unwrap();
        assert_eq!(o.status, OrderStatus::Canceled);
    }

    #[test]
    fn cancel_is_rejected_in_terminal_states() {
        let mut canceled = order(OrderStatus::Canceled);
        assert!(matches!(canceled.cancel(), Err(AppError::AlreadyCanceled(1))));

        let mut paid = order(OrderStatus::Paid);
        assert!(matches!(paid.cancel(), Err(AppError::PaidNotCancellable(1))));
    }

    #[test]
    fn total_is_the_sum_over_items() {
        let items = vec![
            NewOrderItem {
                product_id: 1,
                quantity: 2,
                unit_price: 10.0,
            },
            NewOrderItem {
                product_id: 2,
                quantity: 1,
                unit_price: 5.5,
            },
        ];
        assert_eq!(total_amount(&items), 25.5);
        assert_eq!(total_amount(&[]), 0.0);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Created).unwrap(),
            r#""CREATED""#
        );
        let status: OrderStatus = serde_json::from_str(r#""PAID""#).unwrap();
        assert_eq!(status, OrderStatus::Paid);
    }
}
