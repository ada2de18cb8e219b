use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info};

use super::analysis_service::AnalysisService;
use super::types::ImageResponse;
use super::validation::Pagination;
use crate::database::entities::{image_metadata, images, AiProcessingStatus};
use crate::errors::{GalleryError, GalleryResult};
use crate::imaging;
use crate::storage::{ImageStore, StoredImage};

/// One file part of an upload request
#[derive(Clone, Debug)]
pub struct NewUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

struct PreparedUpload {
    filename: String,
    bytes: Vec<u8>,
    thumbnail: Vec<u8>,
}

#[derive(Clone)]
pub struct ImageService {
    db: DatabaseConnection,
    store: ImageStore,
    analysis: AnalysisService,
    max_upload_bytes: usize,
}

impl ImageService {
    pub fn new(
        db: DatabaseConnection,
        store: ImageStore,
        analysis: AnalysisService,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db,
            store,
            analysis,
            max_upload_bytes,
        }
    }

    /// Store a batch of images for `user_id`.
    ///
    /// Every file is validated and thumbnailed before anything is written;
    /// the rows of the whole batch are inserted in one transaction.
    pub async fn upload(
        &self,
        user_id: &str,
        uploads: Vec<NewUpload>,
    ) -> GalleryResult<Vec<ImageResponse>> {
        if uploads.is_empty() {
            return Err(GalleryError::validation("No files provided"));
        }

        let mut prepared = Vec::with_capacity(uploads.len());
        for upload in uploads {
            prepared.push(self.prepare(upload).await?);
        }

        let mut stored: Vec<StoredImage> = Vec::with_capacity(prepared.len());
        for upload in &prepared {
            match self.store.save(&upload.filename, &upload.bytes, &upload.thumbnail).await {
                Ok(paths) => stored.push(paths),
                Err(err) => {
                    self.discard(&stored).await;
                    return Err(err.into());
                }
            }
        }

        let image_ids = match self.insert_rows(user_id, &prepared, &stored).await {
            Ok(ids) => ids,
            Err(err) => {
                self.discard(&stored).await;
                return Err(err);
            }
        };
        info!("User {} uploaded {} images", user_id, image_ids.len());

        for image_id in &image_ids {
            self.analysis.schedule(*image_id).await;
        }

        let mut responses = Vec::with_capacity(image_ids.len());
        for image_id in image_ids {
            responses.push(self.get(user_id, image_id).await?);
        }
        Ok(responses)
    }

    async fn prepare(&self, upload: NewUpload) -> GalleryResult<PreparedUpload> {
        let NewUpload {
            filename,
            content_type,
            bytes,
        } = upload;

        let is_image = content_type
            .as_deref()
            .map_or(false, |content_type| content_type.starts_with("image/"));
        if !is_image {
            return Err(GalleryError::validation(format!("File {} is not an image", filename)));
        }
        if bytes.is_empty() {
            return Err(GalleryError::validation(format!("File {} is empty", filename)));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(GalleryError::validation(format!(
                "File {} exceeds the {} byte upload limit",
                filename, self.max_upload_bytes
            )));
        }

        let (bytes, thumbnail) = tokio::task::spawn_blocking(move || {
            let thumbnail = imaging::create_thumbnail(&bytes);
            (bytes, thumbnail)
        })
        .await
        .map_err(|e| GalleryError::Internal(e.into()))?;

        let thumbnail = thumbnail.map_err(|err| {
            debug!("Could not decode {}: {}", filename, err);
            GalleryError::validation(format!("File {} is not a valid image", filename))
        })?;

        Ok(PreparedUpload {
            filename,
            bytes,
            thumbnail,
        })
    }

    async fn insert_rows(
        &self,
        user_id: &str,
        prepared: &[PreparedUpload],
        stored: &[StoredImage],
    ) -> GalleryResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        let mut ids = Vec::with_capacity(prepared.len());

        for (upload, paths) in prepared.iter().zip(stored) {
            let image = images::ActiveModel {
                user_id: Set(user_id.to_string()),
                filename: Set(upload.filename.clone()),
                original_path: Set(paths.original_path.clone()),
                thumbnail_path: Set(paths.thumbnail_path.clone()),
                uploaded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            image_metadata::ActiveModel::pending(image.id, user_id)
                .insert(&txn)
                .await?;

            ids.push(image.id);
        }

        txn.commit().await?;
        Ok(ids)
    }

    async fn discard(&self, stored: &[StoredImage]) {
        for paths in stored {
            self.store.remove_quietly(paths).await;
        }
    }

    /// The caller's images with metadata, newest first
    pub async fn list(&self, user_id: &str, page: Pagination) -> GalleryResult<Vec<ImageResponse>> {
        let rows = images::Entity::find()
            .filter(images::Column::UserId.eq(user_id))
            .order_by_desc(images::Column::UploadedAt)
            .order_by_desc(images::Column::Id)
            .find_also_related(image_metadata::Entity)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(image, metadata)| ImageResponse::new(image, metadata))
            .collect())
    }

    pub async fn get(&self, user_id: &str, image_id: i32) -> GalleryResult<ImageResponse> {
        let (image, metadata) = self.find_owned(user_id, image_id).await?;
        Ok(ImageResponse::new(image, metadata))
    }

    /// Delete the image row (metadata follows by cascade) and its files
    pub async fn delete(&self, user_id: &str, image_id: i32) -> GalleryResult<()> {
        let (image, _) = self.find_owned(user_id, image_id).await?;

        images::Entity::delete_by_id(image.id).exec(&self.db).await?;
        self.store
            .remove_quietly(&StoredImage {
                original_path: image.original_path,
                thumbnail_path: image.thumbnail_path,
            })
            .await;

        info!("Deleted image {} of user {}", image_id, user_id);
        Ok(())
    }

    /// Reset the analysis state to `pending` and schedule it again.
    ///
    /// An analysis that is still running is left alone.
    pub async fn reanalyze(&self, user_id: &str, image_id: i32) -> GalleryResult<ImageResponse> {
        let (image, metadata) = self.find_owned(user_id, image_id).await?;

        match metadata {
            Some(metadata) if self.analysis.is_in_flight(&metadata) => {
                debug!("Image {} is already being analyzed", image_id);
                return Ok(ImageResponse::new(image, Some(metadata)));
            }
            Some(metadata) => {
                let mut row: image_metadata::ActiveModel = metadata.into();
                row.ai_processing_status = Set(AiProcessingStatus::Pending);
                row.ai_error = Set(None);
                row.updated_at = Set(Utc::now());
                row.update(&self.db).await?;
            }
            None => {
                image_metadata::ActiveModel::pending(image.id, user_id)
                    .insert(&self.db)
                    .await?;
            }
        }

        self.analysis.schedule(image.id).await;
        self.get(user_id, image.id).await
    }

    /// Image owned by `user_id`; someone else's image is reported as missing
    async fn find_owned(
        &self,
        user_id: &str,
        image_id: i32,
    ) -> GalleryResult<(images::Model, Option<image_metadata::Model>)> {
        images::Entity::find_by_id(image_id)
            .filter(images::Column::UserId.eq(user_id))
            .find_also_related(image_metadata::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| GalleryError::not_found("image", image_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::database::test_utils::setup_test_db;
    use crate::imaging::test_images::png;
    use crate::services::{AnalysisMode, UserService};
    use crate::vision::DisabledAnalyzer;
    use tempfile::TempDir;

    async fn service(mode: AnalysisMode) -> (TempDir, DatabaseConnection, ImageService) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path());
        store.bootstrap().await.unwrap();
        let db = setup_test_db().await;

        UserService::new(db.clone(), store.clone())
            .ensure_user(&AuthenticatedUser {
                id: "owner".to_string(),
                email: None,
            })
            .await
            .unwrap();

        let analysis = AnalysisService::new(
            db.clone(),
            store.clone(),
            Arc::new(DisabledAnalyzer),
            Duration::from_secs(5),
            mode,
        );
        let images = ImageService::new(db.clone(), store, analysis, 1024 * 1024);
        (dir, db, images)
    }

    fn teal_upload() -> NewUpload {
        NewUpload {
            filename: "teal.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: png(16, 16, |_, _| [20, 130, 130]),
        }
    }

    async fn status(db: &DatabaseConnection, image_id: i32) -> AiProcessingStatus {
        image_metadata::Entity::find()
            .filter(image_metadata::Column::ImageId.eq(image_id))
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .ai_processing_status
    }

    #[tokio::test]
    async fn test_reanalyze_runs_again_after_a_failure() {
        let (_dir, db, images) = service(AnalysisMode::Inline).await;
        let uploaded = images.upload("owner", vec![teal_upload()]).await.unwrap();
        let image_id = uploaded[0].id;
        assert_eq!(status(&db, image_id).await, AiProcessingStatus::Failed);

        let response = images.reanalyze("owner", image_id).await.unwrap();
        assert_eq!(response.id, image_id);
        assert_eq!(status(&db, image_id).await, AiProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_reanalyze_leaves_a_running_analysis_alone() {
        let (_dir, db, images) = service(AnalysisMode::Inline).await;
        let uploaded = images.upload("owner", vec![teal_upload()]).await.unwrap();
        let image_id = uploaded[0].id;

        let row = image_metadata::Entity::find()
            .filter(image_metadata::Column::ImageId.eq(image_id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let mut row: image_metadata::ActiveModel = row.into();
        row.ai_processing_status = Set(AiProcessingStatus::Processing);
        row.updated_at = Set(Utc::now());
        row.update(&db).await.unwrap();

        // Inline mode would finish as `failed` if a second analysis started
        images.reanalyze("owner", image_id).await.unwrap();
        assert_eq!(status(&db, image_id).await, AiProcessingStatus::Processing);
    }

    #[tokio::test]
    async fn test_reanalyze_of_someone_elses_image_is_not_found() {
        let (_dir, _db, images) = service(AnalysisMode::Inline).await;
        let uploaded = images.upload("owner", vec![teal_upload()]).await.unwrap();

        assert!(matches!(
            images.reanalyze("intruder", uploaded[0].id).await,
            Err(GalleryError::NotFound { .. })
        ));
    }
}
