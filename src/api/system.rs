use super::{ApiResponse, AppState};
use crate::services::ScanStatus;
use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub database_ok: bool,
    pub movie_scan: ScanStatus,
    pub series_scan: ScanStatus,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let database_ok = state.shared.store.ping().await.is_ok();

    Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        database_ok,
        movie_scan: state.shared.movie_scanner.status().await,
        series_scan: state.shared.series_scanner.status().await,
    }))
}
