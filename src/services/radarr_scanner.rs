//! Movie pipeline: walks every enabled Radarr server's movie list and
//! feeds downloaded titles into the reconciler.

use crate::cache::CacheStore;
use crate::clients::http::HttpClient;
use crate::clients::radarr::{RadarrClient, RadarrMovie};
use crate::clients::tmdb::TmdbClient;
use crate::config::{Config, DvrServerConfig, active_servers};
use crate::services::availability::{AvailabilityReconciler, ExternalRef, MovieFacts};
use crate::services::scanner::{ScanEngine, ScanError, ScanStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct MovieScanner {
    engine: ScanEngine,
    config: Arc<RwLock<Config>>,
    http: Arc<HttpClient>,
    cache: Arc<CacheStore>,
    tmdb: Arc<TmdbClient>,
    reconciler: Arc<AvailabilityReconciler>,
}

impl MovieScanner {
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
            engine: ScanEngine::new("movie", bundle_size, bundle_delay),
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
                cfg.radarr.servers.clone(),
                cfg.radarr.any_4k(),
                Duration::from_millis(cfg.cache.stale_buffer_ms),
            )
        };

        let session = self.engine.start_run(four_k).await;
        let result = self.scan(session, &servers, stale_buffer).await;
        self.engine.end_run(session).await;

        match result {
            Ok(()) => {
                info!(
                    event = "movie_scan_finished",
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Movie scan finished"
                );
                Ok(())
            }
            Err(ScanError::Aborted) => {
                info!(event = "movie_scan_aborted", "Movie scan superseded or cancelled");
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
        for server in active_servers(servers) {
            let client =
                RadarrClient::new(&server, self.http.clone(), self.cache.clone(), stale_buffer);
            let movies = match client.list_movies().await {
                Ok(movies) => movies,
                Err(e) => {
                    // One unreachable server must not end the whole pass.
                    error!(server = %server.hostname, error = %e, "Failed to fetch movie list");
                    continue;
                }
            };

            info!(
                server = %server.hostname,
                items = movies.len(),
                is4k = server.is_4k,
                "Scanning movie server"
            );
            self.engine
                .begin_server(session, &server.hostname, movies.len())
                .await;

            self.engine
                .run_bundles(session, movies, |bundle| {
                    self.process_bundle(server.clone(), bundle)
                })
                .await?;
        }
        Ok(())
    }

    async fn process_bundle(&self, server: DvrServerConfig, bundle: Vec<RadarrMovie>) {
        futures::future::join_all(
            bundle
                .into_iter()
                .map(|movie| self.process_movie(&server, movie)),
        )
        .await;
    }

    async fn process_movie(&self, server: &DvrServerConfig, movie: RadarrMovie) {
        if !movie.is_downloaded() {
            return;
        }

        let catalog_id = match self.resolve_catalog_id(&movie).await {
            Some(id) => id,
            None => {
                warn!(
                    server = %server.hostname,
                    title = %movie.title,
                    service_id = movie.id,
                    "Could not resolve catalog ID, skipping"
                );
                return;
            }
        };

        let facts = MovieFacts {
            is4k: server.is_4k,
            added_at: movie.added,
            external_ref: ExternalRef {
                server_id: server.id,
                service_id: movie.id,
                service_slug: movie.title_slug.clone(),
            },
            title: movie.title.clone(),
        };

        if let Err(e) = self.reconciler.reconcile_movie(catalog_id, facts).await {
            error!(
                server = %server.hostname,
                title = %movie.title,
                service_id = movie.id,
                error = %e,
                "Failed to reconcile movie"
            );
            return;
        }
        metrics::counter!("availability_items_reconciled_total", "scanner" => "movie")
            .increment(1);
    }

    /// DVR items usually carry the catalog ID directly; fall back to an
    /// IMDB-ID lookup against the metadata provider when they don't.
    async fn resolve_catalog_id(&self, movie: &RadarrMovie) -> Option<i32> {
        if let Some(id) = movie.tmdb_id {
            return Some(id);
        }
        let imdb_id = movie.imdb_id.as_deref()?;
        match self.tmdb.movie_id_by_imdb_id(imdb_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(title = %movie.title, imdb_id, error = %e, "IMDB lookup failed");
                None
            }
        }
    }
}
