use crate::cache::{CachePool, CacheStore};
use crate::clients::dvr::{MovieLinkage, PagedResponse, QueueItem};
use crate::clients::external::{ExternalApi, IntegrationError, params};
use crate::clients::http::HttpClient;
use crate::config::DvrServerConfig;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrMovie {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<i32>,
    pub title_slug: String,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default)]
    pub has_file: bool,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
}

impl RadarrMovie {
    /// A movie counts as on disk once the server holds a file for it.
    #[must_use]
    pub const fn is_downloaded(&self) -> bool {
        self.has_file
    }
}

#[derive(Clone)]
pub struct RadarrClient {
    api: ExternalApi,
}

impl RadarrClient {
    #[must_use]
    pub fn new(
        server: &DvrServerConfig,
        http: Arc<HttpClient>,
        cache: Arc<CacheStore>,
        stale_buffer: Duration,
    ) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&server.api_key) {
            headers.insert("X-Api-Key", value);
        }
        Self {
            api: ExternalApi::new(
                "Radarr",
                server.api_base_url(),
                CachePool::Radarr,
                headers,
                Vec::new(),
                http,
                cache,
                stale_buffer,
            ),
        }
    }

    /// Full item list for the scan loop, served through the rolling cache
    /// so back-to-back scans do not hammer the server.
    pub async fn list_movies(&self) -> Result<Vec<RadarrMovie>, IntegrationError> {
        self.api
            .get_rolling("/movie", &[], Duration::from_secs(5 * 60))
            .await
    }

    /// Active queue for the download tracker. Short TTL: progress data is
    /// volatile and only needs to absorb overlapping pollers.
    pub async fn queue(&self) -> Result<Vec<QueueItem<MovieLinkage>>, IntegrationError> {
        let page: PagedResponse<QueueItem<MovieLinkage>> = self
            .api
            .get(
                "/queue",
                &params(&[("page", "1"), ("pageSize", "100"), ("includeMovie", "false")]),
                Some(Duration::from_secs(10)),
            )
            .await?;
        Ok(page.records)
    }
}
