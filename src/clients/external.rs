//! Cache-aside base every external integration funnels through.
//!
//! A deterministic cache key is built from the endpoint plus the
//! stable-sorted query parameters (and the body, for write-through calls).
//! `get_rolling` serves the cached value immediately and refreshes it in
//! the background once its remaining lifetime falls under the staleness
//! buffer, so hot paths never block on a network round trip.

use crate::cache::{CachePool, CacheStore};
use crate::clients::http::HttpClient;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("{integration}: request to {endpoint} failed: {source}")]
pub struct IntegrationError {
    pub integration: String,
    pub endpoint: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Clone)]
pub struct ExternalApi {
    name: String,
    base_url: String,
    pool: CachePool,
    headers: HeaderMap,
    default_params: Vec<(String, String)>,
    http: Arc<HttpClient>,
    cache: Arc<CacheStore>,
    stale_buffer: Duration,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl ExternalApi {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        pool: CachePool,
        headers: HeaderMap,
        default_params: Vec<(String, String)>,
        http: Arc<HttpClient>,
        cache: Arc<CacheStore>,
        stale_buffer: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            pool,
            headers,
            default_params,
            http,
            cache,
            stale_buffer,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn error(&self, endpoint: &str, source: anyhow::Error) -> IntegrationError {
        IntegrationError {
            integration: self.name.clone(),
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Stable key: endpoint plus sorted params, plus the body for posts.
    fn cache_key(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> String {
        let mut sorted: Vec<_> = self
            .default_params
            .iter()
            .chain(params.iter())
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        sorted.sort_unstable();
        let mut key = format!("{endpoint}?{}", sorted.join("&"));
        if let Some(body) = body {
            key.push('|');
            key.push_str(&body.to_string());
        }
        key
    }

    fn build_url(&self, endpoint: &str, params: &[(String, String)]) -> String {
        let mut url = format!("{}{endpoint}", self.base_url);
        let query: Vec<String> = self
            .default_params
            .iter()
            .chain(params.iter())
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    async fn fetch_and_store(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<serde_json::Value, IntegrationError> {
        let url = self.build_url(endpoint, params);
        let value = self
            .http
            .get_json(&url, self.headers.clone())
            .await
            .map_err(|e| self.error(endpoint, e))?;
        self.cache.set(self.pool, key, value.clone(), ttl).await;
        Ok(value)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        value: serde_json::Value,
    ) -> Result<T, IntegrationError> {
        serde_json::from_value(value)
            .map_err(|e| self.error(endpoint, anyhow::anyhow!("malformed response: {e}")))
    }

    /// Cache-aside read: serve the cached value when present, otherwise
    /// call upstream and store the result under `ttl`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<T, IntegrationError> {
        let key = self.cache_key(endpoint, params, None);
        if let Some(cached) = self.cache.get(self.pool, &key).await {
            return self.decode(endpoint, cached);
        }
        let value = self.fetch_and_store(endpoint, params, &key, ttl).await?;
        self.decode(endpoint, value)
    }

    /// Like [`Self::get`], but a hit close to expiry also spawns a
    /// fire-and-forget refresh while still returning the cached value.
    /// A hit therefore never surfaces a network error, and a failed
    /// refresh leaves the existing entry untouched.
    pub async fn get_rolling<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        ttl: Duration,
    ) -> Result<T, IntegrationError> {
        let key = self.cache_key(endpoint, params, None);
        if let Some(cached) = self.cache.get(self.pool, &key).await {
            let remaining = self
                .cache
                .ttl_remaining(self.pool, &key)
                .await
                .unwrap_or_default();
            if remaining < ttl.saturating_sub(self.stale_buffer) {
                self.spawn_refresh(endpoint, params, key, ttl).await;
            }
            return self.decode(endpoint, cached);
        }
        let value = self
            .fetch_and_store(endpoint, params, &key, Some(ttl))
            .await?;
        self.decode(endpoint, value)
    }

    /// Write-through: always calls upstream, then stores the result under
    /// a key that incorporates both body and params.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        params: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<T, IntegrationError> {
        let key = self.cache_key(endpoint, params, Some(body));
        let url = self.build_url(endpoint, params);
        let value = self
            .http
            .post_json(&url, self.headers.clone(), body)
            .await
            .map_err(|e| self.error(endpoint, e))?;
        self.cache.set(self.pool, &key, value.clone(), ttl).await;
        self.decode(endpoint, value)
    }

    /// At most one background refresh per key at a time, best-effort.
    async fn spawn_refresh(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        key: String,
        ttl: Duration,
    ) {
        {
            let mut refreshing = self.refreshing.lock().await;
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        debug!(integration = %self.name, endpoint, "refreshing stale cache entry");
        let this = self.clone();
        let endpoint = endpoint.to_string();
        let params = params.to_vec();
        tokio::spawn(async move {
            if let Err(e) = this
                .fetch_and_store(&endpoint, &params, &key, Some(ttl))
                .await
            {
                // The stale entry stays readable until its real expiry.
                warn!(integration = %this.name, endpoint, error = %e, "background cache refresh failed");
            }
            this.refreshing.lock().await.remove(&key);
        });
    }
}

/// Convenience for building owned param lists at call sites.
#[must_use]
pub fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
