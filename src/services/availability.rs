//! Pure business rules turning DVR facts into the availability state
//! machine. Every mutation runs under the per-key mutex for its catalog
//! ID, so the movie and series pipelines can reconcile the same title
//! concurrently without racing on the row.

use crate::models::{MediaKind, MediaRecord, MediaStatus, ProcessableSeason, Season};
use crate::services::media::{MediaError, MediaStore};
use crate::sync::KeyedMutex;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the reporting server keeps this title.
#[derive(Debug, Clone)]
pub struct ExternalRef {
    pub server_id: i32,
    pub service_id: i32,
    pub service_slug: String,
}

#[derive(Debug, Clone)]
pub struct MovieFacts {
    pub is4k: bool,
    pub added_at: Option<DateTime<Utc>>,
    pub external_ref: ExternalRef,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct SeriesFacts {
    /// Variant fed by the reporting server.
    pub is4k: bool,
    /// Whether any configured 4k-capable server exists. When false the 4k
    /// state machine stays `UNKNOWN` regardless of incoming data.
    pub four_k_enabled: bool,
    /// Alternate external ID (TVDB).
    pub external_id: Option<i32>,
    pub added_at: Option<DateTime<Utc>>,
    pub title: String,
}

pub struct AvailabilityReconciler {
    store: Arc<dyn MediaStore>,
    lock: Arc<KeyedMutex<i32>>,
}

/// Season status from raw episode counts. `total == 0` means upstream
/// metadata is not populated yet and must never read as available.
const fn observed_season_status(available: i32, total: i32) -> MediaStatus {
    if total == 0 {
        MediaStatus::Unknown
    } else if available >= total {
        MediaStatus::Available
    } else if available > 0 {
        MediaStatus::PartiallyAvailable
    } else {
        MediaStatus::Unknown
    }
}

/// Show-level aggregate over the (already sticky) season statuses.
fn aggregate_status(seasons: &[Season], is4k: bool) -> MediaStatus {
    let statuses = seasons.iter().map(|s| if is4k { s.status4k } else { s.status });

    let mut any = false;
    let mut all_available = true;
    let mut any_progress = false;
    for status in statuses {
        any = true;
        if status != MediaStatus::Available {
            all_available = false;
        }
        if matches!(
            status,
            MediaStatus::Available | MediaStatus::PartiallyAvailable
        ) {
            any_progress = true;
        }
    }

    if any && all_available {
        MediaStatus::Available
    } else if any_progress {
        MediaStatus::PartiallyAvailable
    } else {
        MediaStatus::Unknown
    }
}

impl AvailabilityReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn MediaStore>, lock: Arc<KeyedMutex<i32>>) -> Self {
        Self { store, lock }
    }

    /// A movie observed on disk marks its variant `AVAILABLE`. Creates the
    /// record on first sight; on later passes only upgrades (sticky) and
    /// refreshes reference fields that changed or were unset.
    pub async fn reconcile_movie(
        &self,
        catalog_id: i32,
        facts: MovieFacts,
    ) -> Result<(), MediaError> {
        self.lock
            .dispatch(catalog_id, async {
                let existing = self
                    .store
                    .find_by_catalog_id(catalog_id, MediaKind::Movie)
                    .await?;
                let is_new = existing.is_none();
                let mut record =
                    existing.unwrap_or_else(|| MediaRecord::new(catalog_id, MediaKind::Movie));
                let mut changed = is_new;

                let current = if facts.is4k { record.status4k } else { record.status };
                let next = current.apply(MediaStatus::Available);
                if next != current {
                    if facts.is4k {
                        record.status4k = next;
                    } else {
                        record.status = next;
                    }
                    changed = true;
                    info!(
                        catalog_id,
                        title = %facts.title,
                        is4k = facts.is4k,
                        "Movie marked available"
                    );
                }

                changed |= apply_external_ref(&mut record, &facts.external_ref, facts.is4k);

                if let Some(added) = facts.added_at
                    && record.added_at != Some(added)
                {
                    record.added_at = Some(added);
                    changed = true;
                }

                if changed {
                    self.store.save(record).await?;
                } else {
                    debug!(catalog_id, title = %facts.title, "Movie unchanged, skipping write");
                }
                Ok(())
            })
            .await
    }

    /// Recomputes per-season and show-level status for the variant the
    /// reporting server feeds. `seasons` must already exclude season 0 and
    /// seasons the metadata provider does not recognize.
    pub async fn reconcile_series(
        &self,
        catalog_id: i32,
        external_ref: ExternalRef,
        seasons: Vec<ProcessableSeason>,
        facts: SeriesFacts,
    ) -> Result<(), MediaError> {
        let apply4k = facts.is4k && facts.four_k_enabled;
        self.lock
            .dispatch(catalog_id, async {
                let existing = self
                    .store
                    .find_by_catalog_id(catalog_id, MediaKind::Tv)
                    .await?;
                let is_new = existing.is_none();
                let mut record =
                    existing.unwrap_or_else(|| MediaRecord::new(catalog_id, MediaKind::Tv));
                let mut changed = is_new;

                let prev_available = record.available_season_count(facts.is4k);

                for incoming in &seasons {
                    let season = match record
                        .seasons
                        .iter_mut()
                        .find(|s| s.season_number == incoming.season_number)
                    {
                        Some(season) => season,
                        None => {
                            record.seasons.push(Season::new(incoming.season_number));
                            changed = true;
                            record
                                .seasons
                                .last_mut()
                                .unwrap_or_else(|| unreachable!("season was just pushed"))
                        }
                    };

                    if apply4k {
                        let observed = observed_season_status(
                            incoming.episodes_available4k,
                            incoming.total_episodes,
                        );
                        let next = season.status4k.apply(observed);
                        if next != season.status4k {
                            season.status4k = next;
                            changed = true;
                        }
                    } else if !facts.is4k {
                        let observed = observed_season_status(
                            incoming.episodes_available,
                            incoming.total_episodes,
                        );
                        let next = season.status.apply(observed);
                        if next != season.status {
                            season.status = next;
                            changed = true;
                        }
                    }
                }

                if facts.is4k {
                    if facts.four_k_enabled {
                        let next = record
                            .status4k
                            .apply(aggregate_status(&record.seasons, true));
                        if next != record.status4k {
                            record.status4k = next;
                            changed = true;
                        }
                    }
                } else {
                    let next = record.status.apply(aggregate_status(&record.seasons, false));
                    if next != record.status {
                        record.status = next;
                        changed = true;
                    }
                }

                changed |= apply_external_ref(&mut record, &external_ref, facts.is4k);

                if let Some(external_id) = facts.external_id
                    && record.external_id != Some(external_id)
                {
                    record.external_id = Some(external_id);
                    changed = true;
                }

                // A newly completed season is the signal the external
                // notifier watches for.
                if record.available_season_count(facts.is4k) > prev_available {
                    record.last_season_change = Some(Utc::now());
                    if record.added_at.is_none() {
                        record.added_at = Some(facts.added_at.unwrap_or_else(Utc::now));
                    }
                    changed = true;
                    info!(
                        catalog_id,
                        title = %facts.title,
                        is4k = facts.is4k,
                        "Season availability increased"
                    );
                }

                if record.added_at.is_none()
                    && let Some(added) = facts.added_at
                {
                    record.added_at = Some(added);
                    changed = true;
                }

                if changed {
                    self.store.save(record).await?;
                } else {
                    debug!(catalog_id, title = %facts.title, "Series unchanged, skipping write");
                }
                Ok(())
            })
            .await
    }
}

fn apply_external_ref(record: &mut MediaRecord, external: &ExternalRef, is4k: bool) -> bool {
    let mut changed = false;
    if is4k {
        if record.server_id4k != Some(external.server_id) {
            record.server_id4k = Some(external.server_id);
            changed = true;
        }
        if record.service_id4k != Some(external.service_id) {
            record.service_id4k = Some(external.service_id);
            changed = true;
        }
        if record.service_slug4k.as_deref() != Some(&external.service_slug) {
            record.service_slug4k = Some(external.service_slug.clone());
            changed = true;
        }
    } else {
        if record.server_id != Some(external.server_id) {
            record.server_id = Some(external.server_id);
            changed = true;
        }
        if record.service_id != Some(external.service_id) {
            record.service_id = Some(external.service_id);
            changed = true;
        }
        if record.service_slug.as_deref() != Some(&external.service_slug) {
            record.service_slug = Some(external.service_slug.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory stand-in for the sea-orm repository.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<(i32, MediaKind), MediaRecord>>,
        saves: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl MediaStore for MemoryStore {
        async fn find_by_catalog_id(
            &self,
            catalog_id: i32,
            kind: MediaKind,
        ) -> Result<Option<MediaRecord>, MediaError> {
            Ok(self.rows.lock().await.get(&(catalog_id, kind)).cloned())
        }

        async fn save(&self, mut record: MediaRecord) -> Result<MediaRecord, MediaError> {
            *self.saves.lock().await += 1;
            if record.id == 0 {
                record.id = self.rows.lock().await.len() as i32 + 1;
            }
            self.rows
                .lock()
                .await
                .insert((record.catalog_id, record.kind), record.clone());
            Ok(record)
        }
    }

    fn reconciler() -> (Arc<MemoryStore>, AvailabilityReconciler) {
        let store = Arc::new(MemoryStore::default());
        let rec = AvailabilityReconciler::new(store.clone(), Arc::new(KeyedMutex::new()));
        (store, rec)
    }

    fn movie_facts(is4k: bool) -> MovieFacts {
        MovieFacts {
            is4k,
            added_at: Some(Utc::now()),
            external_ref: ExternalRef {
                server_id: 1,
                service_id: 55,
                service_slug: "some-movie".to_string(),
            },
            title: "Some Movie".to_string(),
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

    fn series_facts() -> SeriesFacts {
        SeriesFacts {
            is4k: false,
            four_k_enabled: false,
            external_id: Some(5000),
            added_at: Some(Utc::now()),
            title: "Some Show".to_string(),
        }
    }

    fn series_ref() -> ExternalRef {
        ExternalRef {
            server_id: 2,
            service_id: 9,
            service_slug: "some-show".to_string(),
        }
    }

    #[tokio::test]
    async fn movie_first_sight_creates_available_record() {
        let (store, rec) = reconciler();
        rec.reconcile_movie(603, movie_facts(false)).await.unwrap();

        let record = store
            .find_by_catalog_id(603, MediaKind::Movie)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, MediaStatus::Available);
        assert_eq!(record.status4k, MediaStatus::Unknown);
        assert_eq!(record.server_id, Some(1));
        assert_eq!(record.service_slug.as_deref(), Some("some-movie"));
    }

    #[tokio::test]
    async fn movie_4k_observation_touches_only_4k_variant() {
        let (store, rec) = reconciler();
        rec.reconcile_movie(603, movie_facts(true)).await.unwrap();

        let record = store
            .find_by_catalog_id(603, MediaKind::Movie)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, MediaStatus::Unknown);
        assert_eq!(record.status4k, MediaStatus::Available);
        assert_eq!(record.server_id, None);
        assert_eq!(record.server_id4k, Some(1));
    }

    #[tokio::test]
    async fn movie_reconcile_is_idempotent() {
        let (store, rec) = reconciler();
        let facts = movie_facts(false);
        rec.reconcile_movie(603, facts.clone()).await.unwrap();
        let saves_after_first = *store.saves.lock().await;
        rec.reconcile_movie(603, facts).await.unwrap();
        assert_eq!(*store.saves.lock().await, saves_after_first);
    }

    #[tokio::test]
    async fn series_partial_then_full_then_sticky() {
        let (store, rec) = reconciler();

        // 4 of 10 episodes: partially available.
        rec.reconcile_series(100, series_ref(), vec![season(1, 4, 10)], series_facts())
            .await
            .unwrap();
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.seasons[0].status, MediaStatus::PartiallyAvailable);
        assert_eq!(record.status, MediaStatus::PartiallyAvailable);
        assert!(record.last_season_change.is_none());

        // All 10: season and show flip to available, change is stamped.
        rec.reconcile_series(100, series_ref(), vec![season(1, 10, 10)], series_facts())
            .await
            .unwrap();
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.seasons[0].status, MediaStatus::Available);
        assert_eq!(record.status, MediaStatus::Available);
        let stamp = record.last_season_change;
        assert!(stamp.is_some());

        // Erroneous zero report: sticky keeps everything available.
        rec.reconcile_series(100, series_ref(), vec![season(1, 0, 10)], series_facts())
            .await
            .unwrap();
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.seasons[0].status, MediaStatus::Available);
        assert_eq!(record.status, MediaStatus::Available);
        assert_eq!(record.last_season_change, stamp);
    }

    #[tokio::test]
    async fn series_reconcile_is_idempotent() {
        let (store, rec) = reconciler();
        rec.reconcile_series(100, series_ref(), vec![season(1, 10, 10)], series_facts())
            .await
            .unwrap();
        let saves = *store.saves.lock().await;
        let stamp = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap()
            .last_season_change;

        rec.reconcile_series(100, series_ref(), vec![season(1, 10, 10)], series_facts())
            .await
            .unwrap();
        assert_eq!(*store.saves.lock().await, saves);
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        // No spurious re-stamp on an identical pass.
        assert_eq!(record.last_season_change, stamp);
    }

    #[tokio::test]
    async fn zero_total_episodes_reads_unknown() {
        let (store, rec) = reconciler();
        rec.reconcile_series(100, series_ref(), vec![season(1, 0, 0)], series_facts())
            .await
            .unwrap();
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.seasons[0].status, MediaStatus::Unknown);
        assert_eq!(record.status, MediaStatus::Unknown);
    }

    #[tokio::test]
    async fn mixed_seasons_aggregate_to_partial() {
        let (store, rec) = reconciler();
        rec.reconcile_series(
            100,
            series_ref(),
            vec![season(1, 10, 10), season(2, 0, 8)],
            series_facts(),
        )
        .await
        .unwrap();
        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, MediaStatus::PartiallyAvailable);
    }

    #[tokio::test]
    async fn four_k_data_is_ignored_when_disabled() {
        let (store, rec) = reconciler();
        let facts = SeriesFacts {
            is4k: true,
            four_k_enabled: false,
            external_id: Some(5000),
            added_at: None,
            title: "Some Show".to_string(),
        };
        rec.reconcile_series(
            100,
            series_ref(),
            vec![ProcessableSeason {
                season_number: 1,
                episodes_available: 0,
                episodes_available4k: 10,
                total_episodes: 10,
            }],
            facts,
        )
        .await
        .unwrap();

        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status4k, MediaStatus::Unknown);
        assert_eq!(record.seasons[0].status4k, MediaStatus::Unknown);
    }

    #[tokio::test]
    async fn four_k_pass_does_not_touch_standard_variant() {
        let (store, rec) = reconciler();
        rec.reconcile_series(100, series_ref(), vec![season(1, 4, 10)], series_facts())
            .await
            .unwrap();

        let facts = SeriesFacts {
            is4k: true,
            four_k_enabled: true,
            external_id: Some(5000),
            added_at: None,
            title: "Some Show".to_string(),
        };
        rec.reconcile_series(
            100,
            series_ref(),
            vec![ProcessableSeason {
                season_number: 1,
                episodes_available: 0,
                episodes_available4k: 10,
                total_episodes: 10,
            }],
            facts,
        )
        .await
        .unwrap();

        let record = store
            .find_by_catalog_id(100, MediaKind::Tv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.seasons[0].status, MediaStatus::PartiallyAvailable);
        assert_eq!(record.seasons[0].status4k, MediaStatus::Available);
        assert_eq!(record.status4k, MediaStatus::Available);
    }
}
