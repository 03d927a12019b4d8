//! Persistence boundary consumed by the reconciler.
//!
//! The reconciler only needs lookup-by-catalog-ID and save; keeping the
//! seam a trait lets unit tests run against an in-memory store while the
//! wired application uses the `sea-orm` repository.

use crate::models::{MediaKind, MediaRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// At most one record exists per (catalog ID, kind).
    async fn find_by_catalog_id(
        &self,
        catalog_id: i32,
        kind: MediaKind,
    ) -> Result<Option<MediaRecord>, MediaError>;

    /// Inserts when `record.id == 0`, updates otherwise. Returns the
    /// persisted record with assigned row IDs.
    async fn save(&self, record: MediaRecord) -> Result<MediaRecord, MediaError>;
}
