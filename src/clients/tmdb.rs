//! Metadata-provider client, used to resolve alternate external IDs to
//! canonical catalog IDs and to confirm which seasons a show actually has.

use crate::cache::{CachePool, CacheStore};
use crate::clients::external::{ExternalApi, IntegrationError, params};
use crate::clients::http::HttpClient;
use crate::config::TmdbConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct FindResult {
    id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTvShow {
    pub id: i32,
    #[serde(default)]
    pub seasons: Vec<TmdbSeason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSeason {
    pub season_number: i32,
    #[serde(default)]
    pub episode_count: i32,
}

#[derive(Clone)]
pub struct TmdbClient {
    api: ExternalApi,
}

impl TmdbClient {
    #[must_use]
    pub fn new(
        config: &TmdbConfig,
        http: Arc<HttpClient>,
        cache: Arc<CacheStore>,
        stale_buffer: Duration,
    ) -> Self {
        Self {
            api: ExternalApi::new(
                "TMDB",
                config.base_url.clone(),
                CachePool::Tmdb,
                reqwest::header::HeaderMap::new(),
                vec![("api_key".to_string(), config.api_key.clone())],
                http,
                cache,
                stale_buffer,
            ),
        }
    }

    /// Resolves an IMDB ID to the canonical catalog ID, if known upstream.
    /// External-ID mappings change rarely, so this rides a long rolling TTL.
    pub async fn movie_id_by_imdb_id(
        &self,
        imdb_id: &str,
    ) -> Result<Option<i32>, IntegrationError> {
        let endpoint = format!("/find/{imdb_id}");
        let found: FindResponse = self
            .api
            .get_rolling(
                &endpoint,
                &params(&[("external_source", "imdb_id")]),
                Duration::from_secs(60 * 60),
            )
            .await?;
        Ok(found.movie_results.first().map(|m| m.id))
    }

    /// Resolves a TVDB series ID to the canonical catalog ID.
    pub async fn tv_id_by_tvdb_id(&self, tvdb_id: i32) -> Result<Option<i32>, IntegrationError> {
        let endpoint = format!("/find/{tvdb_id}");
        let found: FindResponse = self
            .api
            .get_rolling(
                &endpoint,
                &params(&[("external_source", "tvdb_id")]),
                Duration::from_secs(60 * 60),
            )
            .await?;
        Ok(found.tv_results.first().map(|m| m.id))
    }

    /// Show details with the season list the provider recognizes.
    pub async fn tv_show(&self, catalog_id: i32) -> Result<TmdbTvShow, IntegrationError> {
        let endpoint = format!("/tv/{catalog_id}");
        self.api
            .get_rolling(&endpoint, &[], Duration::from_secs(30 * 60))
            .await
    }
}
