use crate::cache::{CachePool, CacheStore};
use crate::clients::dvr::{EpisodeLinkage, PagedResponse, QueueItem};
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
pub struct SonarrSeries {
    pub id: i32,
    pub title: String,
    pub tvdb_id: i32,
    pub title_slug: String,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seasons: Vec<SonarrSeason>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrSeason {
    pub season_number: i32,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default)]
    pub statistics: Option<SeasonStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStatistics {
    #[serde(default)]
    pub episode_file_count: i32,
    #[serde(default)]
    pub total_episode_count: i32,
}

#[derive(Clone)]
pub struct SonarrClient {
    api: ExternalApi,
}

impl SonarrClient {
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
                "Sonarr",
                server.api_base_url(),
                CachePool::Sonarr,
                headers,
                Vec::new(),
                http,
                cache,
                stale_buffer,
            ),
        }
    }

    /// Full series list, season statistics included.
    pub async fn list_series(&self) -> Result<Vec<SonarrSeries>, IntegrationError> {
        self.api
            .get_rolling(
                "/series",
                &params(&[("includeSeasonImages", "false")]),
                Duration::from_secs(5 * 60),
            )
            .await
    }

    pub async fn queue(&self) -> Result<Vec<QueueItem<EpisodeLinkage>>, IntegrationError> {
        let page: PagedResponse<QueueItem<EpisodeLinkage>> = self
            .api
            .get(
                "/queue",
                &params(&[
                    ("page", "1"),
                    ("pageSize", "100"),
                    ("includeSeries", "false"),
                    ("includeEpisode", "false"),
                ]),
                Some(Duration::from_secs(10)),
            )
            .await?;
        Ok(page.records)
    }
}
