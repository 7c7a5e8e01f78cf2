//! View documents stored in MongoDB.
//!
//! The embedded user/product snapshots are denormalised copies kept
//! eventually consistent by the projections: events arriving out of order
//! leave blank snapshots that later events back-fill.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Document in `views.users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Document in `views.products`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// User copy embedded in order views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl UserSnapshot {
    /// Placeholder embedded when the user view does not exist yet.
    pub fn blank(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
        }
    }
}

impl From<&UserView> for UserSnapshot {
    fn from(view: &UserView) -> Self {
        Self {
            id: view.id,
            name: view.name.clone(),
            email: view.email.clone(),
        }
    }
}

/// Product copy embedded in order items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i32,
}

impl ProductSnapshot {
    /// Placeholder embedded when the product view does not exist yet.
    pub fn blank(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
            price: 0.0,
            stock: 0,
        }
    }
}

impl From<&ProductView> for ProductSnapshot {
    fn from(view: &ProductView) -> Self {
        Self {
            id: view.id,
            name: view.name.clone(),
            price: view.price,
            stock: view.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemView {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
    pub product: ProductSnapshot,
}

/// Document in `views.orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_amount: f64,
    pub user: UserSnapshot,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime>,
}

impl OrderView {
    /// Build the view from an `order.created` event, embedding whatever
    /// snapshots are already known. Absent snapshots stay blank until the
    /// matching user/product event back-fills them.
    pub fn from_event(
        event: &event_schema::OrderCreated,
        user: Option<&UserView>,
        products: &std::collections::HashMap<i64, ProductView>,
    ) -> Self {
        let user_id = event.order.user_id as i64;
        let user_snapshot = user
            .map(UserSnapshot::from)
            .unwrap_or_else(|| UserSnapshot::blank(user_id));

        let items = event
            .order
            .items
            .iter()
            .map(|item| {
                let product_id = item.product_id as i64;
                let product = products
                    .get(&product_id)
                    .map(ProductSnapshot::from)
                    .unwrap_or_else(|| ProductSnapshot::blank(product_id));
                OrderItemView {
                    product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    product,
                }
            })
            .collect();

        Self {
            id: event.order.id as i64,
            user_id,
            status: event.order.status.clone(),
            total_amount: event.order.total_amount,
            user: user_snapshot,
            items,
            created_at: DateTime::from_chrono(event.meta.occurred_at),
            updated_at: DateTime::now(),
            paid_at: None,
            canceled_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_snapshots_carry_only_the_id() {
        let user = UserSnapshot::blank(7);
        assert_eq!(user.id, 7);
        assert!(user.name.is_empty());
        assert!(user.email.is_empty());

        let product = ProductSnapshot::blank(3);
        assert_eq!(product.id, 3);
        assert!(product.name.is_empty());
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn order_view_omits_terminal_timestamps_until_set() {
        let view = OrderView {
            id: 1,
            user_id: 7,
            status: "CREATED".to_string(),
            total_amount: 20.0,
            user: UserSnapshot::blank(7),
            items: vec![],
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
            paid_at: None,
            canceled_at: None,
        };

        let doc = mongodb::bson::to_document(&view).unwrap();
        assert!(!doc.contains_key("paid_at"));
        assert!(!doc.contains_key("canceled_at"));
        assert_eq!(doc.get_i64("_id").unwrap(), 1);
    }
}
