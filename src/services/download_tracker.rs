//! Polls every DVR queue and keeps an in-memory snapshot of in-flight
//! downloads, keyed by server ID.
//!
//! Servers pointing at the same underlying instance are polled once, but
//! the resulting snapshot is published under every configured server ID so
//! lookups work regardless of which entry a caller knows about.

use crate::cache::CacheStore;
use crate::clients::dvr::{EpisodeLinkage, MovieLinkage, QueueItem};
use crate::clients::http::HttpClient;
use crate::clients::radarr::RadarrClient;
use crate::clients::sonarr::SonarrClient;
use crate::config::{Config, DvrServerConfig, active_servers};
use crate::models::MediaKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadingItem {
    pub external_id: i32,
    pub media_kind: MediaKind,
    pub size: f64,
    pub size_left: f64,
    pub status: String,
    pub time_left: Option<String>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub title: String,
    pub episode_id: Option<i32>,
}

impl DownloadingItem {
    fn from_movie(item: QueueItem<MovieLinkage>) -> Self {
        Self {
            external_id: item.media.movie_id,
            media_kind: MediaKind::Movie,
            size: item.size,
            size_left: item.sizeleft,
            status: item.status,
            time_left: item.timeleft,
            estimated_completion_time: item.estimated_completion_time,
            title: item.title,
            episode_id: None,
        }
    }

    fn from_episode(item: QueueItem<EpisodeLinkage>) -> Self {
        Self {
            external_id: item.media.series_id,
            media_kind: MediaKind::Tv,
            size: item.size,
            size_left: item.sizeleft,
            status: item.status,
            time_left: item.timeleft,
            estimated_completion_time: item.estimated_completion_time,
            title: item.title,
            episode_id: item.media.episode_id,
        }
    }
}

pub struct DownloadTracker {
    config: Arc<RwLock<Config>>,
    http: Arc<HttpClient>,
    cache: Arc<CacheStore>,
    snapshots: RwLock<HashMap<i32, Vec<DownloadingItem>>>,
}

impl DownloadTracker {
    #[must_use]
    pub fn new(config: Arc<RwLock<Config>>, http: Arc<HttpClient>, cache: Arc<CacheStore>) -> Self {
        Self {
            config,
            http,
            cache,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Refreshes every server's snapshot. Each server is polled
    /// independently; one failing queue does not block the others, and a
    /// failed poll keeps the previous snapshot in place.
    pub async fn poll(&self) {
        let (radarr, sonarr, stale_buffer) = {
            let cfg = self.config.read().await;
            (
                cfg.radarr.servers.clone(),
                cfg.sonarr.servers.clone(),
                Duration::from_millis(cfg.cache.stale_buffer_ms),
            )
        };

        let movie_polls = active_servers(&radarr).into_iter().map(|server| {
            let ids = instance_ids(&radarr, &server);
            async move {
                let client = RadarrClient::new(
                    &server,
                    self.http.clone(),
                    self.cache.clone(),
                    stale_buffer,
                );
                match client.queue().await {
                    Ok(items) => Some((
                        ids,
                        items.into_iter().map(DownloadingItem::from_movie).collect(),
                    )),
                    Err(e) => {
                        warn!(server = %server.hostname, error = %e, "Movie queue poll failed");
                        None
                    }
                }
            }
        });
        let series_polls = active_servers(&sonarr).into_iter().map(|server| {
            let ids = instance_ids(&sonarr, &server);
            async move {
                let client = SonarrClient::new(
                    &server,
                    self.http.clone(),
                    self.cache.clone(),
                    stale_buffer,
                );
                match client.queue().await {
                    Ok(items) => Some((
                        ids,
                        items
                            .into_iter()
                            .map(DownloadingItem::from_episode)
                            .collect(),
                    )),
                    Err(e) => {
                        warn!(server = %server.hostname, error = %e, "Series queue poll failed");
                        None
                    }
                }
            }
        });

        let (movie_results, series_results) = tokio::join!(
            futures::future::join_all(movie_polls),
            futures::future::join_all(series_polls),
        );

        let mut snapshots = self.snapshots.write().await;
        for (ids, items) in movie_results.into_iter().chain(series_results).flatten() {
            let items: Vec<DownloadingItem> = items;
            debug!(servers = ?ids, items = items.len(), "Queue snapshot updated");
            for id in ids {
                snapshots.insert(id, items.clone());
            }
        }
    }

    /// Downloads on one server that belong to the given external media ID.
    pub async fn get_progress(&self, server_id: i32, external_id: i32) -> Vec<DownloadingItem> {
        self.snapshots
            .read()
            .await
            .get(&server_id)
            .map(|items| {
                items
                    .iter()
                    .filter(|i| i.external_id == external_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn all(&self) -> HashMap<i32, Vec<DownloadingItem>> {
        self.snapshots.read().await.clone()
    }

    pub async fn reset(&self) {
        self.snapshots.write().await.clear();
    }
}

/// Every configured server ID that shares the given server's instance.
fn instance_ids(servers: &[DvrServerConfig], server: &DvrServerConfig) -> Vec<i32> {
    servers
        .iter()
        .filter(|s| s.same_instance(server))
        .map(|s| s.id)
        .collect()
}
