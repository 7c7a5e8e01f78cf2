use std::collections::HashMap;

use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson, DateTime, Document};
use mongodb::options::{FindOptions, ReplaceOptions};
use mongodb::{Collection, Database};

use event_schema::{OrderCreated, ProductData, UserData};

use crate::views::{OrderView, ProductSnapshot, ProductView, UserSnapshot, UserView};

type MongoResult<T> = Result<T, mongodb::error::Error>;

/// Maintains `views.orders`, including the denormalised user and product
/// snapshots.
pub struct OrderProjection {
    collection: Collection<OrderView>,
}

impl OrderProjection {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("views.orders"),
        }
    }

    /// Replace-with-upsert keyed by id, so replaying the event does not
    /// error on a duplicate key.
    pub async fn handle_order_created(
        &self,
        event: &OrderCreated,
        user: Option<UserView>,
        products: HashMap<i64, ProductView>,
    ) -> MongoResult<()> {
        let view = OrderView::from_event(event, user.as_ref(), &products);

        self.collection
            .replace_one(
                doc! { "_id": view.id },
                &view,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    pub async fn mark_paid(&self, order_id: i64) -> MongoResult<()> {
        self.collection
            .update_one(
                doc! { "_id": order_id },
                doc! {
                    "$set": {
                        "status": "PAID",
                        "paid_at": DateTime::now(),
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn mark_canceled(&self, order_id: i64) -> MongoResult<()> {
        self.collection
            .update_one(
                doc! { "_id": order_id },
                doc! {
                    "$set": {
                        "status": "CANCELED",
                        "canceled_at": DateTime::now(),
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Back-fill the embedded user snapshot in every order of this user.
    pub async fn patch_user(&self, user: &UserData) -> MongoResult<()> {
        let snapshot = to_bson(&UserSnapshot {
            id: user.id as i64,
            name: user.name.clone(),
            email: user.email.clone(),
        })
        .map_err(mongodb::error::Error::from)?;

        self.collection
            .update_many(
                doc! { "user_id": user.id as i64 },
                doc! {
                    "$set": {
                        "user": snapshot,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Back-fill the embedded product snapshot in order items referencing
    /// this product.
    pub async fn patch_product(&self, product: &ProductData) -> MongoResult<()> {
        let snapshot = to_bson(&ProductSnapshot {
            id: product.id as i64,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
        })
        .map_err(mongodb::error::Error::from)?;

        self.collection
            .update_many(
                doc! { "items.product_id": product.id as i64 },
                doc! {
                    "$set": {
                        "items.$.product": snapshot,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> MongoResult<Option<OrderView>> {
        self.collection.find_one(doc! { "_id": id }, None).await
    }

    pub async fn list(
        &self,
        user_id: Option<i64>,
        status: Option<&str>,
    ) -> MongoResult<Vec<OrderView>> {
        let mut filter = Document::new();
        if let Some(user_id) = user_id {
            filter.insert("user_id", user_id);
        }
        if let Some(status) = status {
            filter.insert("status", status);
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self.collection.find(filter, options).await?;
        cursor.try_collect().await
    }
}
