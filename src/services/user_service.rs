use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set};
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::database::entities::{images, users};
use crate::errors::GalleryResult;
use crate::storage::{ImageStore, StoredImage};

/// Local owner rows for identities held by the auth platform
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    store: ImageStore,
}

impl UserService {
    pub fn new(db: DatabaseConnection, store: ImageStore) -> Self {
        Self { db, store }
    }

    /// Insert the owner row, or refresh its email and last-seen time
    pub async fn ensure_user(&self, user: &AuthenticatedUser) -> GalleryResult<()> {
        let now = Utc::now();
        let row = users::ActiveModel {
            id: Set(user.id.clone()),
            email: Set(user.email.clone()),
            created_at: Set(now),
            last_seen_at: Set(now),
        };

        users::Entity::insert(row)
            .on_conflict(
                OnConflict::column(users::Column::Id)
                    .update_columns([users::Column::Email, users::Column::LastSeenAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    /// Delete the owner row; the database cascades to images and metadata,
    /// after which the stored files are removed. Returns the number of images removed.
    pub async fn delete_user(&self, user_id: &str) -> GalleryResult<usize> {
        let files: Vec<(String, String)> = images::Entity::find()
            .select_only()
            .column(images::Column::OriginalPath)
            .column(images::Column::ThumbnailPath)
            .filter(images::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        users::Entity::delete_by_id(user_id.to_string())
            .exec(&self.db)
            .await?;

        for (original_path, thumbnail_path) in &files {
            self.store
                .remove_quietly(&StoredImage {
                    original_path: original_path.clone(),
                    thumbnail_path: thumbnail_path.clone(),
                })
                .await;
        }

        info!("Deleted user {} and {} images", user_id, files.len());
        Ok(files.len())
    }
}
