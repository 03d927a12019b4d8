//! Outbound HTTP plumbing shared by every integration client.
//!
//! Wraps a pooled `reqwest::Client` with an optional sliding-window /
//! per-second rate limit. Calls that would exceed a limit are delayed
//! until a slot opens, never rejected. Forward-proxy routing is picked up
//! from `HTTPS_PROXY` / `HTTP_PROXY` at construction.

use anyhow::{Context, Result, bail};
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Request caps for one integration. Both caps are optional and enforced
/// together when set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimit {
    /// Max requests inside the rolling window.
    pub max_requests: Option<u32>,
    /// Rolling window length, seconds.
    pub window_seconds: u64,
    /// Max requests in any rolling second.
    pub max_requests_per_second: Option<u32>,
}

impl RateLimit {
    const fn is_active(&self) -> bool {
        self.max_requests.is_some() || self.max_requests_per_second.is_some()
    }
}

#[derive(Debug)]
struct RateLimiter {
    limit: RateLimit,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window: Duration::from_secs(limit.window_seconds.max(1)),
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until the caller may send one request.
    async fn acquire(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut sent = self.sent.lock().await;
                while let Some(front) = sent.front() {
                    if now.saturating_duration_since(*front) >= self.window {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }

                let window_wait = self.limit.max_requests.and_then(|max| {
                    if sent.len() < max as usize {
                        None
                    } else {
                        let oldest = sent[sent.len() - max as usize];
                        Some(self.window.saturating_sub(now.saturating_duration_since(oldest)))
                    }
                });

                let second_wait = self.limit.max_requests_per_second.and_then(|max| {
                    let second = Duration::from_secs(1);
                    let recent = sent
                        .iter()
                        .rev()
                        .take_while(|t| now.saturating_duration_since(**t) < second)
                        .count();
                    if recent < max as usize {
                        None
                    } else {
                        let gate = sent[sent.len() - max as usize];
                        Some(second.saturating_sub(now.saturating_duration_since(gate)))
                    }
                });

                match (window_wait, second_wait) {
                    (None, None) => {
                        sent.push_back(now);
                        None
                    }
                    (a, b) => Some(a.unwrap_or_default().max(b.unwrap_or_default())),
                }
            };

            match wait {
                None => return,
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "rate limit reached, delaying request");
                    tokio::time::sleep(delay.max(Duration::from_millis(10))).await;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    limiter: Option<RateLimiter>,
}

impl HttpClient {
    pub fn new(limit: RateLimit, timeout_seconds: u64) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(crate::constants::USER_AGENT)
            .pool_max_idle_per_host(10);

        if let Ok(proxy) = std::env::var("HTTPS_PROXY") {
            builder = builder.proxy(reqwest::Proxy::https(&proxy).context("Invalid HTTPS_PROXY")?);
        }
        if let Ok(proxy) = std::env::var("HTTP_PROXY") {
            builder = builder.proxy(reqwest::Proxy::http(&proxy).context("Invalid HTTP_PROXY")?);
        }

        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            limiter: limit.is_active().then(|| RateLimiter::new(limit)),
        })
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
    }

    pub async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<serde_json::Value> {
        self.throttle().await;
        let response = self.client.get(url).headers(headers).send().await?;
        Self::read_json(response).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.throttle().await;
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("upstream returned {status}: {body}");
        }
        Ok(response.json().await?)
    }
}
