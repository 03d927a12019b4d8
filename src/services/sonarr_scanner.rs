//! Series pipeline: walks every enabled Sonarr server, cross-references
//! seasons against the metadata provider, and feeds season statistics
//! into the reconciler.

use crate::cache::CacheStore;
use crate::clients::http::HttpClient;
use crate::clients::sonarr::{SonarrClient, SonarrSeries};
use crate::clients::tmdb::TmdbClient;
use crate::config::{Config, DvrServerConfig, active_servers};
use crate::models::ProcessableSeason;
use crate::services::availability::{AvailabilityReconciler, ExternalRef, SeriesFacts};
use crate::services::scanner::{ScanEngine, ScanError, ScanStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct SeriesScanner {
    engine: ScanEngine,
    config: Arc<RwLock<Config>>,
    http: Arc<HttpClient>,
    cache: Arc<CacheStore>,
    tmdb: Arc<TmdbClient>,
    reconciler: Arc<AvailabilityReconciler>,
}

impl SeriesScanner {
    #[must_use]
    pub fn new(
        config: Arc<RwLock<Config>>,
        http: Arc<HttpClient>,
        cache: Arc<CacheStore>,
        tmdb: Arc<TmdbClient>,
        reconciler: Arc<AvailabilityReconciler>,
        bundle_size: usize,
        bundle_delay: Duration,
    ) -> Self {
        Self {
            engine: ScanEngine::new("series", bundle_size, bundle_delay),
            config,
            http,
            cache,
            tmdb,
            reconciler,
        }
    }

    pub async fn status(&self) -> ScanStatus {
        self.engine.status().await
    }

    pub async fn cancel(&self) {
        self.engine.cancel().await;
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let start = std::time::Instant::now();
        let (servers, four_k, stale_buffer) = {
            let cfg = self.config.read().await;
            (
                cfg.sonarr.servers.clone(),
                cfg.sonarr.any_4k(),
                Duration::from_millis(cfg.cache.stale_buffer_ms),
            )
        };

        let session = self.engine.start_run(four_k).await;
        let result = self.scan(session, &servers, stale_buffer).await;
        self.engine.end_run(session).await;

        match result {
            Ok(()) => {
                info!(
                    event = "series_scan_finished",
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Series scan finished"
                );
                Ok(())
            }
            Err(ScanError::Aborted) => {
                info!(event = "series_scan_aborted", "Series scan superseded or cancelled");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(
        &self,
        session: uuid::Uuid,
        servers: &[DvrServerConfig],
        stale_buffer: Duration,
    ) -> Result<(), ScanError> {
        let four_k_enabled = self.engine.four_k_enabled().await;

        for server in active_servers(servers) {
            let client =
                SonarrClient::new(&server, self.http.clone(), self.cache.clone(), stale_buffer);
            let series = match client.list_series().await {
                Ok(series) => series,
                Err(e) => {
                    error!(server = %server.hostname, error = %e, "Failed to fetch series list");
                    continue;
                }
            };

            info!(
                server = %server.hostname,
                items = series.len(),
                is4k = server.is_4k,
                "Scanning series server"
            );
            self.engine
                .begin_server(session, &server.hostname, series.len())
                .await;

            self.engine
                .run_bundles(session, series, |bundle| {
                    self.process_bundle(server.clone(), four_k_enabled, bundle)
                })
                .await?;
        }
        Ok(())
    }

    async fn process_bundle(
        &self,
        server: DvrServerConfig,
        four_k_enabled: bool,
        bundle: Vec<SonarrSeries>,
    ) {
        futures::future::join_all(
            bundle
                .into_iter()
                .map(|series| self.process_series(&server, four_k_enabled, series)),
        )
        .await;
    }

    async fn process_series(
        &self,
        server: &DvrServerConfig,
        four_k_enabled: bool,
        series: SonarrSeries,
    ) {
        let Some(catalog_id) = self.resolve_catalog_id(&series).await else {
            warn!(
                server = %server.hostname,
                title = %series.title,
                tvdb_id = series.tvdb_id,
                "Could not resolve catalog ID, skipping"
            );
            return;
        };

        let seasons = match self.build_seasons(server, catalog_id, &series).await {
            Ok(seasons) => seasons,
            Err(e) => {
                error!(
                    server = %server.hostname,
                    title = %series.title,
                    tvdb_id = series.tvdb_id,
                    error = %e,
                    "Failed to build season list"
                );
                return;
            }
        };

        let facts = SeriesFacts {
            is4k: server.is_4k,
            four_k_enabled,
            external_id: Some(series.tvdb_id),
            added_at: series.added,
            title: series.title.clone(),
        };
        let external_ref = ExternalRef {
            server_id: server.id,
            service_id: series.id,
            service_slug: series.title_slug.clone(),
        };

        if let Err(e) = self
            .reconciler
            .reconcile_series(catalog_id, external_ref, seasons, facts)
            .await
        {
            error!(
                server = %server.hostname,
                title = %series.title,
                tvdb_id = series.tvdb_id,
                error = %e,
                "Failed to reconcile series"
            );
            return;
        }
        metrics::counter!("availability_items_reconciled_total", "scanner" => "series")
            .increment(1);
    }

    async fn resolve_catalog_id(&self, series: &SonarrSeries) -> Option<i32> {
        match self.tmdb.tv_id_by_tvdb_id(series.tvdb_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(title = %series.title, tvdb_id = series.tvdb_id, error = %e, "TVDB lookup failed");
                None
            }
        }
    }

    /// Season 0 and seasons the metadata provider does not recognize are
    /// dropped before the reconciler ever sees them.
    async fn build_seasons(
        &self,
        server: &DvrServerConfig,
        catalog_id: i32,
        series: &SonarrSeries,
    ) -> Result<Vec<ProcessableSeason>, crate::clients::IntegrationError> {
        let show = self.tmdb.tv_show(catalog_id).await?;
        let known: std::collections::HashSet<i32> = show
            .seasons
            .iter()
            .map(|s| s.season_number)
            .filter(|n| *n != 0)
            .collect();

        Ok(series
            .seasons
            .iter()
            .filter(|s| s.season_number != 0 && known.contains(&s.season_number))
            .map(|s| {
                let stats = s.statistics.as_ref();
                let available = stats.map_or(0, |st| st.episode_file_count);
                let total = stats.map_or(0, |st| st.total_episode_count);
                ProcessableSeason {
                    season_number: s.season_number,
                    episodes_available: if server.is_4k { 0 } else { available },
                    episodes_available4k: if server.is_4k { available } else { 0 },
                    total_episodes: total,
                }
            })
            .collect())
    }
}
