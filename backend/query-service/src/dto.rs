//! JSON response shapes for the read API.
//!
//! View documents carry BSON datetimes; the responses render them as
//! RFC-3339 strings.

use mongodb::bson::DateTime;
use serde::Serialize;

use crate::views::{OrderItemView, OrderView, ProductSnapshot, ProductView, UserSnapshot, UserView};

fn rfc3339(dt: DateTime) -> String {
    dt.to_chrono().to_rfc3339()
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserView> for UserResponse {
    fn from(view: UserView) -> Self {
        Self {
            id: view.id,
            name: view.name,
            email: view.email,
            created_at: rfc3339(view.created_at),
            updated_at: rfc3339(view.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProductView> for ProductResponse {
    fn from(view: ProductView) -> Self {
        Self {
            id: view.id,
            name: view.name,
            price: view.price,
            stock: view.stock,
            created_at: rfc3339(view.created_at),
            updated_at: rfc3339(view.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
    pub product: ProductSnapshot,
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(item: OrderItemView) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product: item.product,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_amount: f64,
    pub user: UserSnapshot,
    pub items: Vec<OrderItemResponse>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<String>,
}

impl From<OrderView> for OrderResponse {
    fn from(view: OrderView) -> Self {
        Self {
            id: view.id,
            user_id: view.user_id,
            status: view.status,
            total_amount: view.total_amount,
            user: view.user,
            items: view.items.into_iter().map(OrderItemResponse::from).collect(),
            created_at: rfc3339(view.created_at),
            updated_at: rfc3339(view.updated_at),
            paid_at: view.paid_at.map(rfc3339),
            canceled_at: view.canceled_at.map(rfc3339),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_response_renders_terminal_timestamps() {
        let view = OrderView {
            id: 1,
            user_id: 7,
            status: "PAID".to_string(),
            total_amount: 20.0,
            user: UserSnapshot {
                id: 7,
                name: "A".to_string(),
                email: "a@x".to_string(),
            },
            items: vec![OrderItemView {
                product_id: 3,
                quantity: 2,
                unit_price: 10.0,
                product: ProductSnapshot {
                    id: 3,
                    name: "P".to_string(),
                    price: 10.0,
                    stock: 3,
                },
            }],
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
            paid_at: Some(DateTime::now()),
            canceled_at: None,
        };

        let response = OrderResponse::from(view);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();

        assert_eq!(json["status"], "PAID");
        assert_eq!(json["user"]["email"], "a@x");
        assert_eq!(json["items"][0]["product"]["stock"], 3);
        assert!(json["paid_at"].is_string());
        assert!(json.get("canceled_at").is_none());
    }
}
