use super::{ApiResponse, AppState};
use crate::services::download_tracker::DownloadingItem;
use axum::{Json, extract::State};
use std::collections::HashMap;
use std::sync::Arc;

pub async fn get_downloads(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HashMap<i32, Vec<DownloadingItem>>>> {
    Json(ApiResponse::success(state.shared.downloads.all().await))
}
