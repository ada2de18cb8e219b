use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub use super::common_types::{AiProcessingStatus, StringList};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub image_id: i32,
    /// Copied from the owning image so rows can be filtered without a join
    pub user_id: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: StringList,
    /// Lowercase `#rrggbb`
    #[sea_orm(column_type = "JsonBinary")]
    pub colors: StringList,
    pub ai_processing_status: AiProcessingStatus,
    /// Last analysis failure, cleared on success
    pub ai_error: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::images::Entity",
        from = "Column::ImageId",
        to = "super::images::Column::Id",
        on_delete = "Cascade"
    )]
    Images,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::images::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Fresh `pending` row for a just-uploaded image
    pub fn pending(image_id: i32, user_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ActiveValue::NotSet,
            image_id: Set(image_id),
            user_id: Set(user_id.into()),
            description: Set(None),
            tags: Set(StringList::default()),
            colors: Set(StringList::default()),
            ai_processing_status: Set(AiProcessingStatus::Pending),
            ai_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}
