//! Shared application wiring: one of everything, built once at startup.

use crate::cache::CacheStore;
use crate::clients::http::HttpClient;
use crate::clients::tmdb::TmdbClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::availability::AvailabilityReconciler;
use crate::services::download_tracker::DownloadTracker;
use crate::services::radarr_scanner::MovieScanner;
use crate::services::sonarr_scanner::SeriesScanner;
use crate::sync::KeyedMutex;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,
    pub store: Store,
    pub cache: Arc<CacheStore>,
    pub http: Arc<HttpClient>,
    pub tmdb: Arc<TmdbClient>,
    pub movie_scanner: Arc<MovieScanner>,
    pub series_scanner: Arc<SeriesScanner>,
    pub downloads: Arc<DownloadTracker>,
}

impl SharedState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::new(&config.general.database_path)
            .await
            .context("failed to open database")?;

        let cache = Arc::new(CacheStore::new());
        let http = Arc::new(
            HttpClient::new(
                config.rate_limit.as_limit(),
                config.general.http_timeout_seconds,
            )
            .context("failed to build HTTP client")?,
        );

        let stale_buffer = Duration::from_millis(config.cache.stale_buffer_ms);
        let tmdb = Arc::new(TmdbClient::new(
            &config.tmdb,
            http.clone(),
            cache.clone(),
            stale_buffer,
        ));

        // Both scan pipelines share one keyed lock so movie and series
        // passes never race on the same catalog entry.
        let lock = Arc::new(KeyedMutex::new());
        let reconciler = Arc::new(AvailabilityReconciler::new(
            Arc::new(store.media()),
            lock,
        ));

        let bundle_size = config.scanner.bundle_size;
        let bundle_delay = Duration::from_secs(config.scanner.bundle_delay_seconds);
        let config = Arc::new(RwLock::new(config));

        let movie_scanner = Arc::new(MovieScanner::new(
            config.clone(),
            http.clone(),
            cache.clone(),
            tmdb.clone(),
            reconciler.clone(),
            bundle_size,
            bundle_delay,
        ));
        let series_scanner = Arc::new(SeriesScanner::new(
            config.clone(),
            http.clone(),
            cache.clone(),
            tmdb.clone(),
            reconciler,
            bundle_size,
            bundle_delay,
        ));
        let downloads = Arc::new(DownloadTracker::new(
            config.clone(),
            http.clone(),
            cache.clone(),
        ));

        Ok(Self {
            config,
            store,
            cache,
            http,
            tmdb,
            movie_scanner,
            series_scanner,
            downloads,
        })
    }
}
