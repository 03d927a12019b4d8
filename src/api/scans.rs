use super::{ApiError, ApiResponse, AppState};
use crate::services::ScanStatus;
use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::error;

enum Pipeline {
    Movie,
    Series,
}

fn pipeline(kind: &str) -> Result<Pipeline, ApiError> {
    match kind {
        "movie" => Ok(Pipeline::Movie),
        "series" => Ok(Pipeline::Series),
        other => Err(ApiError::validation(format!(
            "unknown scan pipeline '{other}', expected 'movie' or 'series'"
        ))),
    }
}

pub async fn get_scan_status(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<ScanStatus>>, ApiError> {
    let status = match pipeline(&kind)? {
        Pipeline::Movie => state.shared.movie_scanner.status().await,
        Pipeline::Series => state.shared.series_scanner.status().await,
    };
    Ok(Json(ApiResponse::success(status)))
}

/// Kicks off a scan in the background and returns immediately. A run
/// started while another is active supersedes it.
pub async fn run_scan(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    match pipeline(&kind)? {
        Pipeline::Movie => {
            let scanner = state.shared.movie_scanner.clone();
            tokio::spawn(async move {
                if let Err(e) = scanner.run().await {
                    error!(error = %e, "Movie scan failed");
                }
            });
        }
        Pipeline::Series => {
            let scanner = state.shared.series_scanner.clone();
            tokio::spawn(async move {
                if let Err(e) = scanner.run().await {
                    error!(error = %e, "Series scan failed");
                }
            });
        }
    }
    Ok(Json(ApiResponse::success("started")))
}

pub async fn cancel_scan(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    match pipeline(&kind)? {
        Pipeline::Movie => state.shared.movie_scanner.cancel().await,
        Pipeline::Series => state.shared.series_scanner.cancel().await,
    }
    Ok(Json(ApiResponse::success("cancelled")))
}
