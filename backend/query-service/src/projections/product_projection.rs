use futures::stream::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOptions, ReplaceOptions};
use mongodb::{Collection, Database};

use event_schema::{ProductCreated, ProductUpdated};

use crate::views::ProductView;

type MongoResult<T> = Result<T, mongodb::error::Error>;

/// Maintains `views.products`.
pub struct ProductProjection {
    collection: Collection<ProductView>,
}

impl ProductProjection {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("views.products"),
        }
    }

    pub async fn handle_product_created(&self, event: &ProductCreated) -> MongoResult<()> {
        let view = ProductView {
            id: event.product.id as i64,
            name: event.product.name.clone(),
            price: event.product.price,
            stock: event.product.stock,
            created_at: DateTime::from_chrono(event.meta.occurred_at),
            updated_at: DateTime::now(),
        };

        self.collection
            .replace_one(
                doc! { "_id": view.id },
                &view,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    pub async fn handle_product_updated(&self, event: &ProductUpdated) -> MongoResult<()> {
        self.collection
            .update_one(
                doc! { "_id": event.product.id as i64 },
                doc! {
                    "$set": {
                        "name": &event.product.name,
                        "price": event.product.price,
                        "stock": event.product.stock,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Stock movement from `stock.reserved` / `stock.released`; `delta` is
    /// negative for reservations.
    pub async fn adjust_stock(&self, product_id: i64, delta: i32) -> MongoResult<()> {
        self.collection
            .update_one(
                doc! { "_id": product_id },
                doc! {
                    "$inc": { "stock": delta },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> MongoResult<Option<ProductView>> {
        self.collection.find_one(doc! { "_id": id }, None).await
    }

    pub async fn list(&self) -> MongoResult<Vec<ProductView>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self.collection.find(doc! {}, options).await?;
        cursor.try_collect().await
    }
}
