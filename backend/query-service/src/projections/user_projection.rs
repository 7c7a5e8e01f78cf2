use futures::stream::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOptions, ReplaceOptions};
use mongodb::{Collection, Database};

use event_schema::{UserCreated, UserUpdated};

use crate::views::UserView;

type MongoResult<T> = Result<T, mongodb::error::Error>;

/// Maintains `views.users`.
pub struct UserProjection {
    collection: Collection<UserView>,
}

impl UserProjection {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("views.users"),
        }
    }

    /// Replace-with-upsert keyed by id, so replaying the event does not
    /// error on a duplicate key.
    pub async fn handle_user_created(&self, event: &UserCreated) -> MongoResult<()> {
        let view = UserView {
            id: event.user.id as i64,
            name: event.user.name.clone(),
            email: event.user.email.clone(),
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

    pub async fn handle_user_updated(&self, event: &UserUpdated) -> MongoResult<()> {
        self.collection
            .update_one(
                doc! { "_id": event.user.id as i64 },
                doc! {
                    "$set": {
                        "name": &event.user.name,
                        "email": &event.user.email,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> MongoResult<Option<UserView>> {
        self.collection.find_one(doc! { "_id": id }, None).await
    }

    pub async fn list(&self) -> MongoResult<Vec<UserView>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self.collection.find(doc! {}, options).await?;
        cursor.try_collect().await
    }
}
