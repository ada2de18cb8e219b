//! Vision analysis and palette extraction for stored images.
//!
//! Every uploaded image has a metadata row from the start. Analysis moves it
//! from `pending` through `processing` to `completed` or `failed`; the row is
//! updated in place and never removed here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr, EntityTrait, Set};
use tracing::{debug, error, info, warn};

use crate::database::entities::{image_metadata, images, AiProcessingStatus, StringList};
use crate::errors::{AnalysisError, GalleryError, GalleryResult};
use crate::imaging;
use crate::storage::ImageStore;
use crate::vision::{sniff_mime_type, VisionAnalysis, VisionAnalyzer};

/// Where analysis runs relative to the request that triggered it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Spawned onto the runtime; the request returns with the row still `pending`
    Background,
    /// Awaited before the request returns
    Inline,
}

#[derive(Clone)]
pub struct AnalysisService {
    db: DatabaseConnection,
    store: ImageStore,
    analyzer: Arc<dyn VisionAnalyzer>,
    timeout: Duration,
    mode: AnalysisMode,
}

impl AnalysisService {
    pub fn new(
        db: DatabaseConnection,
        store: ImageStore,
        analyzer: Arc<dyn VisionAnalyzer>,
        timeout: Duration,
        mode: AnalysisMode,
    ) -> Self {
        Self {
            db,
            store,
            analyzer,
            timeout,
            mode,
        }
    }

    /// Whether an analysis of this row may still be running.
    ///
    /// A row left `pending` or `processing` for more than twice the vision
    /// timeout is treated as abandoned.
    pub fn is_in_flight(&self, metadata: &image_metadata::Model) -> bool {
        if metadata.ai_processing_status.is_terminal() {
            return false;
        }
        match (Utc::now() - metadata.updated_at).to_std() {
            Ok(age) => age <= self.timeout * 2,
            Err(_) => true,
        }
    }

    /// Run or spawn analysis for an image; failures end up on the row, not here
    pub async fn schedule(&self, image_id: i32) {
        match self.mode {
            AnalysisMode::Inline => {
                if let Err(err) = self.process(image_id).await {
                    error!("Analysis of image {} could not run: {}", image_id, err);
                }
            }
            AnalysisMode::Background => {
                let service = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = service.process(image_id).await {
                        error!("Analysis of image {} could not run: {}", image_id, err);
                    }
                });
            }
        }
    }

    /// Analyze one image and record the outcome on its metadata row
    pub async fn process(&self, image_id: i32) -> GalleryResult<AiProcessingStatus> {
        let (image, metadata) = images::Entity::find_by_id(image_id)
            .find_also_related(image_metadata::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| GalleryError::not_found("image", image_id))?;

        let metadata = match metadata {
            Some(metadata) => metadata,
            None => {
                image_metadata::ActiveModel::pending(image.id, image.user_id.clone())
                    .insert(&self.db)
                    .await?
            }
        };

        info!("Starting analysis for image {}", image_id);
        let mut row: image_metadata::ActiveModel = metadata.into();
        row.ai_processing_status = Set(AiProcessingStatus::Processing);
        row.updated_at = Set(Utc::now());
        let row = match row.update(&self.db).await {
            Ok(row) => row,
            Err(DbErr::RecordNotUpdated) => {
                debug!("Image {} was deleted before analysis started", image_id);
                return Ok(AiProcessingStatus::Failed);
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = match self.store.read(&image.original_path).await {
            Ok(bytes) => self.analyze(bytes).await,
            Err(err) => Outcome {
                result: Err(format!("Stored original unavailable: {}", err)),
                colors: Vec::new(),
            },
        };

        let metadata_id = row.id;
        let mut row: image_metadata::ActiveModel = row.into();
        row.colors = Set(StringList(outcome.colors));
        row.updated_at = Set(Utc::now());
        let status = match outcome.result {
            Ok(analysis) => {
                row.description = Set(Some(analysis.description));
                row.tags = Set(StringList(analysis.tags));
                row.ai_error = Set(None);
                AiProcessingStatus::Completed
            }
            Err(message) => {
                warn!("Analysis of image {} failed: {}", image_id, message);
                row.ai_error = Set(Some(message));
                AiProcessingStatus::Failed
            }
        };
        row.ai_processing_status = Set(status);

        match row.update(&self.db).await {
            Ok(_) => {
                info!("Analysis of image {} finished as {:?}", image_id, status);
                Ok(status)
            }
            Err(DbErr::RecordNotUpdated) => {
                debug!("Image {} was deleted during analysis", image_id);
                Ok(status)
            }
            Err(err) => {
                error!("Could not record analysis of image {}: {}", image_id, err);
                self.mark_failed(metadata_id, format!("Could not record analysis: {}", err))
                    .await;
                Err(err.into())
            }
        }
    }

    /// Best-effort move out of `processing` after the outcome could not be saved
    async fn mark_failed(&self, metadata_id: i32, message: String) {
        let row = image_metadata::ActiveModel {
            id: ActiveValue::Unchanged(metadata_id),
            ai_processing_status: Set(AiProcessingStatus::Failed),
            ai_error: Set(Some(message)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(err) = row.update(&self.db).await {
            warn!("Image metadata {} is left in processing: {}", metadata_id, err);
        }
    }

    async fn analyze(&self, bytes: Vec<u8>) -> Outcome {
        let mime_type = sniff_mime_type(&bytes);

        let analysis = self.analyzer.analyze(&bytes, mime_type);
        let result = match tokio::time::timeout(self.timeout, analysis).await {
            Ok(Ok(analysis)) => Ok(analysis),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(AnalysisError::Timeout(self.timeout).to_string()),
        };

        let palette = tokio::task::spawn_blocking(move || imaging::extract_colors(&bytes));
        let colors = match palette.await {
            Ok(colors) => colors,
            Err(err) => {
                warn!("Color extraction task failed: {}", err);
                Vec::new()
            }
        };

        Outcome { result, colors }
    }
}

struct Outcome {
    result: Result<VisionAnalysis, String>,
    colors: Vec<String>,
}
