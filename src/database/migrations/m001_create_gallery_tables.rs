use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).text())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::LastSeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::UserId).text().not_null())
                    .col(ColumnDef::new(Images::Filename).text().not_null())
                    .col(ColumnDef::new(Images::OriginalPath).text().not_null())
                    .col(ColumnDef::new(Images::ThumbnailPath).text().not_null())
                    .col(
                        ColumnDef::new(Images::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-images-user_id")
                            .from(Images::Table, Images::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ImageMetadata::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImageMetadata::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ImageMetadata::ImageId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ImageMetadata::UserId).text().not_null())
                    .col(ColumnDef::new(ImageMetadata::Description).text())
                    .col(ColumnDef::new(ImageMetadata::Tags).json_binary().not_null())
                    .col(ColumnDef::new(ImageMetadata::Colors).json_binary().not_null())
                    .col(
                        ColumnDef::new(ImageMetadata::AiProcessingStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(ImageMetadata::AiError).text())
                    .col(
                        ColumnDef::new(ImageMetadata::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImageMetadata::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-image_metadata-image_id")
                            .from(ImageMetadata::Table, ImageMetadata::ImageId)
                            .to(Images::Table, Images::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-image_metadata-user_id")
                            .from(ImageMetadata::Table, ImageMetadata::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing is always "this user's images, newest first"
        manager
            .create_index(
                Index::create()
                    .name("idx_images_user_id_uploaded_at")
                    .table(Images::Table)
                    .col(Images::UserId)
                    .col(Images::UploadedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_image_metadata_user_id")
                    .table(ImageMetadata::Table)
                    .col(ImageMetadata::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ImageMetadata::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    CreatedAt,
    LastSeenAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    UserId,
    Filename,
    OriginalPath,
    ThumbnailPath,
    UploadedAt,
}

#[derive(DeriveIden)]
enum ImageMetadata {
    Table,
    Id,
    ImageId,
    UserId,
    Description,
    Tags,
    Colors,
    AiProcessingStatus,
    AiError,
    CreatedAt,
    UpdatedAt,
}
