//! Wire types shared by the Radarr-style and Sonarr-style DVR APIs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PagedResponse<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// One in-flight download as reported by a DVR queue endpoint.
///
/// The two services decorate queue rows differently (movies carry a movie
/// ID, series rows carry series and episode IDs), so the media linkage is
/// a type parameter rather than a loosely-typed bag of optionals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem<E> {
    pub title: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub sizeleft: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timeleft: Option<String>,
    #[serde(default)]
    pub estimated_completion_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub media: E,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieLinkage {
    pub movie_id: i32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeLinkage {
    pub series_id: i32,
    #[serde(default)]
    pub episode_id: Option<i32>,
}
