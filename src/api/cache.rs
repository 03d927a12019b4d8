use super::{ApiResponse, AppState};
use crate::cache::CachePoolStats;
use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

pub async fn get_cache_stats(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<CachePoolStats>>> {
    Json(ApiResponse::success(state.shared.cache.stats().await))
}

pub async fn flush_cache(State(state): State<Arc<AppState>>) -> Json<ApiResponse<&'static str>> {
    state.shared.cache.clear_all().await;
    info!(event = "cache_flushed", "All cache pools flushed");
    Json(ApiResponse::success("flushed"))
}
