use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Media::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Media::CatalogId).integer().not_null())
                    .col(ColumnDef::new(Media::ExternalId).integer())
                    .col(ColumnDef::new(Media::Kind).string().not_null())
                    .col(ColumnDef::new(Media::Status).string().not_null())
                    .col(ColumnDef::new(Media::Status4k).string().not_null())
                    .col(ColumnDef::new(Media::ServerId).integer())
                    .col(ColumnDef::new(Media::ServerId4k).integer())
                    .col(ColumnDef::new(Media::ServiceId).integer())
                    .col(ColumnDef::new(Media::ServiceId4k).integer())
                    .col(ColumnDef::new(Media::ServiceSlug).string())
                    .col(ColumnDef::new(Media::ServiceSlug4k).string())
                    .col(ColumnDef::new(Media::AddedAt).timestamp())
                    .col(ColumnDef::new(Media::LastSeasonChange).timestamp())
                    .to_owned(),
            )
            .await?;

        // One record per catalog ID per kind.
        manager
            .create_index(
                Index::create()
                    .name("idx_media_catalog_kind")
                    .table(Media::Table)
                    .col(Media::CatalogId)
                    .col(Media::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Seasons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Seasons::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Seasons::MediaId).integer().not_null())
                    .col(ColumnDef::new(Seasons::SeasonNumber).integer().not_null())
                    .col(ColumnDef::new(Seasons::Status).string().not_null())
                    .col(ColumnDef::new(Seasons::Status4k).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seasons_media")
                            .from(Seasons::Table, Seasons::MediaId)
                            .to(Media::Table, Media::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seasons_media_number")
                    .table(Seasons::Table)
                    .col(Seasons::MediaId)
                    .col(Seasons::SeasonNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Seasons::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Media::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Media {
    Table,
    Id,
    CatalogId,
    ExternalId,
    Kind,
    Status,
    Status4k,
    ServerId,
    ServerId4k,
    ServiceId,
    ServiceId4k,
    ServiceSlug,
    ServiceSlug4k,
    AddedAt,
    LastSeasonChange,
}

#[derive(DeriveIden)]
enum Seasons {
    Table,
    Id,
    MediaId,
    SeasonNumber,
    Status,
    Status4k,
}
