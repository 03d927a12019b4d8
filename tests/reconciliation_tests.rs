//! End-to-end reconciliation against a real sqlite store: the repository,
//! the keyed lock, and the status rules working together.

use availarr::db::Store;
use availarr::models::{MediaKind, MediaRecord, MediaStatus, ProcessableSeason, Season};
use availarr::services::availability::{
    AvailabilityReconciler, ExternalRef, MovieFacts, SeriesFacts,
};
use availarr::services::media::MediaStore;
use availarr::sync::KeyedMutex;
use chrono::Utc;
use std::sync::Arc;

async fn setup() -> (Store, AvailabilityReconciler) {
    let store = Store::new("sqlite::memory:").await.unwrap();
    let reconciler = AvailabilityReconciler::new(
        Arc::new(store.media()),
        Arc::new(KeyedMutex::new()),
    );
    (store, reconciler)
}

fn movie_facts(is4k: bool) -> MovieFacts {
    MovieFacts {
        is4k,
        added_at: Some(Utc::now()),
        external_ref: ExternalRef {
            server_id: 0,
            service_id: 42,
            service_slug: "the-matrix".to_string(),
        },
        title: "The Matrix".to_string(),
    }
}

fn series_ref() -> ExternalRef {
    ExternalRef {
        server_id: 1,
        service_id: 7,
        service_slug: "severance".to_string(),
    }
}

fn series_facts() -> SeriesFacts {
    SeriesFacts {
        is4k: false,
        four_k_enabled: false,
        external_id: Some(371980),
        added_at: Some(Utc::now()),
        title: "Severance".to_string(),
    }
}

fn season(number: i32, available: i32, total: i32) -> ProcessableSeason {
    ProcessableSeason {
        season_number: number,
        episodes_available: available,
        episodes_available4k: 0,
        total_episodes: total,
    }
}

#[tokio::test]
async fn movie_reconcile_persists_through_sqlite() {
    let (store, reconciler) = setup().await;
    reconciler
        .reconcile_movie(603, movie_facts(false))
        .await
        .unwrap();

    let repo = store.media();
    let record = repo
        .find_by_catalog_id(603, MediaKind::Movie)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(record.id, 0);
    assert_eq!(record.status, MediaStatus::Available);
    assert_eq!(record.status4k, MediaStatus::Unknown);
    assert_eq!(record.service_slug.as_deref(), Some("the-matrix"));
    assert!(record.added_at.is_some());

    // Same title as a movie does not collide with a series row.
    assert!(
        repo.find_by_catalog_id(603, MediaKind::Tv)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn both_variants_accumulate_on_one_row() {
    let (store, reconciler) = setup().await;
    reconciler
        .reconcile_movie(603, movie_facts(false))
        .await
        .unwrap();
    reconciler
        .reconcile_movie(603, movie_facts(true))
        .await
        .unwrap();

    let record = store
        .media()
        .find_by_catalog_id(603, MediaKind::Movie)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, MediaStatus::Available);
    assert_eq!(record.status4k, MediaStatus::Available);
    assert_eq!(record.server_id, Some(0));
    assert_eq!(record.server_id4k, Some(0));
}

#[tokio::test]
async fn series_seasons_upsert_and_order() {
    let (store, reconciler) = setup().await;
    reconciler
        .reconcile_series(
            95396,
            series_ref(),
            vec![season(2, 3, 10), season(1, 9, 9)],
            series_facts(),
        )
        .await
        .unwrap();

    let record = store
        .media()
        .find_by_catalog_id(95396, MediaKind::Tv)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.external_id, Some(371980));
    assert_eq!(record.seasons.len(), 2);
    // Repository returns seasons ordered by number.
    assert_eq!(record.seasons[0].season_number, 1);
    assert_eq!(record.seasons[0].status, MediaStatus::Available);
    assert_eq!(record.seasons[1].season_number, 2);
    assert_eq!(record.seasons[1].status, MediaStatus::PartiallyAvailable);
    assert_eq!(record.status, MediaStatus::PartiallyAvailable);

    // Second pass completes season 2; the row is updated, not duplicated.
    reconciler
        .reconcile_series(
            95396,
            series_ref(),
            vec![season(2, 10, 10)],
            series_facts(),
        )
        .await
        .unwrap();

    let record = store
        .media()
        .find_by_catalog_id(95396, MediaKind::Tv)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.seasons.len(), 2);
    assert_eq!(record.seasons[1].status, MediaStatus::Available);
    assert_eq!(record.status, MediaStatus::Available);
    assert!(record.last_season_change.is_some());
}

#[tokio::test]
async fn availability_survives_regressing_report() {
    let (store, reconciler) = setup().await;
    reconciler
        .reconcile_series(95396, series_ref(), vec![season(1, 9, 9)], series_facts())
        .await
        .unwrap();
    reconciler
        .reconcile_series(95396, series_ref(), vec![season(1, 0, 9)], series_facts())
        .await
        .unwrap();

    let record = store
        .media()
        .find_by_catalog_id(95396, MediaKind::Tv)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.seasons[0].status, MediaStatus::Available);
    assert_eq!(record.status, MediaStatus::Available);
}

#[tokio::test]
async fn concurrent_passes_on_same_title_serialize() {
    let (store, reconciler) = setup().await;
    let reconciler = Arc::new(reconciler);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let rec = reconciler.clone();
        handles.push(tokio::spawn(async move {
            rec.reconcile_movie(603, movie_facts(false)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let repo = store.media();
    let record = repo
        .find_by_catalog_id(603, MediaKind::Movie)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, MediaStatus::Available);
}

#[tokio::test]
async fn failed_season_write_leaves_no_partial_record() {
    let store = Store::new("sqlite::memory:").await.unwrap();
    let repo = store.media();

    // Duplicate season numbers violate the unique seasons index after the
    // media row has already been written inside the same save.
    let mut record = MediaRecord::new(1396, MediaKind::Tv);
    record.seasons = vec![Season::new(1), Season::new(1)];
    assert!(repo.save(record).await.is_err());

    let found = repo
        .find_by_catalog_id(1396, MediaKind::Tv)
        .await
        .unwrap();
    assert!(found.is_none(), "rolled-back save must not leave a media row");
}
