use crate::entities::{media, prelude::*, season};
use crate::models::{MediaKind, MediaRecord, MediaStatus, Season as DomainSeason};
use crate::services::media::{MediaError, MediaStore};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

pub struct MediaRepository {
    conn: DatabaseConnection,
}

impl MediaRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn parse_ts(value: Option<&String>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    fn to_domain(model: media::Model, seasons: Vec<season::Model>) -> MediaRecord {
        MediaRecord {
            id: model.id,
            catalog_id: model.catalog_id,
            external_id: model.external_id,
            kind: MediaKind::parse(&model.kind),
            status: MediaStatus::parse(&model.status),
            status4k: MediaStatus::parse(&model.status4k),
            server_id: model.server_id,
            server_id4k: model.server_id4k,
            service_id: model.service_id,
            service_id4k: model.service_id4k,
            service_slug: model.service_slug,
            service_slug4k: model.service_slug4k,
            added_at: Self::parse_ts(model.added_at.as_ref()),
            last_season_change: Self::parse_ts(model.last_season_change.as_ref()),
            seasons: seasons
                .into_iter()
                .map(|s| DomainSeason {
                    season_number: s.season_number,
                    status: MediaStatus::parse(&s.status),
                    status4k: MediaStatus::parse(&s.status4k),
                })
                .collect(),
        }
    }

    fn to_active(record: &MediaRecord) -> media::ActiveModel {
        media::ActiveModel {
            id: if record.id == 0 {
                sea_orm::ActiveValue::NotSet
            } else {
                Set(record.id)
            },
            catalog_id: Set(record.catalog_id),
            external_id: Set(record.external_id),
            kind: Set(record.kind.as_str().to_string()),
            status: Set(record.status.as_str().to_string()),
            status4k: Set(record.status4k.as_str().to_string()),
            server_id: Set(record.server_id),
            server_id4k: Set(record.server_id4k),
            service_id: Set(record.service_id),
            service_id4k: Set(record.service_id4k),
            service_slug: Set(record.service_slug.clone()),
            service_slug4k: Set(record.service_slug4k.clone()),
            added_at: Set(record.added_at.map(|t| t.to_rfc3339())),
            last_season_change: Set(record.last_season_change.map(|t| t.to_rfc3339())),
        }
    }

    async fn save_seasons<C: ConnectionTrait>(
        conn: &C,
        media_id: i32,
        seasons: &[DomainSeason],
    ) -> Result<(), MediaError> {
        let existing = Season::find()
            .filter(season::Column::MediaId.eq(media_id))
            .all(conn)
            .await?;

        for incoming in seasons {
            match existing
                .iter()
                .find(|row| row.season_number == incoming.season_number)
            {
                Some(row) => {
                    if row.status != incoming.status.as_str()
                        || row.status4k != incoming.status4k.as_str()
                    {
                        let mut active: season::ActiveModel = row.clone().into();
                        active.status = Set(incoming.status.as_str().to_string());
                        active.status4k = Set(incoming.status4k.as_str().to_string());
                        active.update(conn).await?;
                    }
                }
                None => {
                    let active = season::ActiveModel {
                        id: sea_orm::ActiveValue::NotSet,
                        media_id: Set(media_id),
                        season_number: Set(incoming.season_number),
                        status: Set(incoming.status.as_str().to_string()),
                        status4k: Set(incoming.status4k.as_str().to_string()),
                    };
                    active.insert(conn).await?;
                }
            }
        }

        Ok(())
    }

    async fn load(&self, model: media::Model) -> Result<MediaRecord, MediaError> {
        let seasons = model
            .find_related(Season)
            .order_by_asc(season::Column::SeasonNumber)
            .all(&self.conn)
            .await?;
        Ok(Self::to_domain(model, seasons))
    }
}

#[async_trait::async_trait]
impl MediaStore for MediaRepository {
    async fn find_by_catalog_id(
        &self,
        catalog_id: i32,
        kind: MediaKind,
    ) -> Result<Option<MediaRecord>, MediaError> {
        let row = Media::find()
            .filter(media::Column::CatalogId.eq(catalog_id))
            .filter(media::Column::Kind.eq(kind.as_str()))
            .one(&self.conn)
            .await?;

        match row {
            Some(model) => Ok(Some(self.load(model).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: MediaRecord) -> Result<MediaRecord, MediaError> {
        // The row and its seasons land together or not at all.
        let txn = self.conn.begin().await?;
        let model = if record.id == 0 {
            Self::to_active(&record).insert(&txn).await?
        } else {
            Self::to_active(&record).update(&txn).await?
        };
        Self::save_seasons(&txn, model.id, &record.seasons).await?;
        txn.commit().await?;

        self.load(model).await
    }
}
