use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

mod cache;
mod downloads;
mod error;
mod observability;
mod scans;
mod system;

pub use error::ApiError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub struct AppState {
    pub shared: Arc<SharedState>,
    pub start_time: std::time::Instant,
    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn new(shared: Arc<SharedState>, prometheus_handle: Option<PrometheusHandle>) -> Self {
        Self {
            shared,
            start_time: std::time::Instant::now(),
            prometheus_handle,
        }
    }
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.shared.config.read().await;
        config.server.cors_allowed_origins.clone()
    };

    let api_router = Router::new()
        .route("/status", get(system::get_status))
        .route("/scan/{kind}", get(scans::get_scan_status))
        .route("/scan/{kind}/run", post(scans::run_scan))
        .route("/scan/{kind}/cancel", post(scans::cancel_scan))
        .route("/downloads", get(downloads::get_downloads))
        .route("/cache", get(cache::get_cache_stats))
        .route("/cache/flush", post(cache::flush_cache))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api/v1", api_router)
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    async fn test_router() -> Router {
        let mut config = Config::default();
        config.general.database_path = "sqlite::memory:".to_string();
        let shared = Arc::new(SharedState::new(config).await.unwrap());
        router(Arc::new(AppState::new(shared, None))).await
    }

    #[tokio::test]
    async fn status_endpoint_reports_idle_scanners() {
        let app = test_router().await;
        let response = app
            .oneshot(Request::get("/api/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["database_ok"], true);
        assert_eq!(json["data"]["movie_scan"]["running"], false);
        assert_eq!(json["data"]["series_scan"]["running"], false);
    }

    #[tokio::test]
    async fn unknown_scan_kind_is_rejected() {
        let app = test_router().await;
        let response = app
            .oneshot(Request::get("/api/v1/scan/music").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn cache_flush_round_trip() {
        let app = test_router().await;
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/cache/flush")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/v1/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let pools = json["data"].as_array().unwrap();
        assert!(pools.iter().all(|p| p["entries"] == 0));
    }
}
