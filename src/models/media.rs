use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability state machine for a title or a season.
///
/// Standard and 4k variants run this machine independently. The only
/// downgrade path out of `Available` is an explicit external deletion,
/// which is handled outside the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Unknown,
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
}

impl MediaStatus {
    /// Applies one reconciliation observation to the current status.
    ///
    /// `Available` is sticky: once reached, later passes reporting fewer
    /// episodes must not regress it. Every reconciliation path (movie,
    /// season, show aggregate, both variants) funnels through here so the
    /// sticky rule cannot diverge between pipelines.
    #[must_use]
    pub fn apply(self, observed: Self) -> Self {
        if self == Self::Available {
            return Self::Available;
        }
        observed
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::PartiallyAvailable => "PARTIALLY_AVAILABLE",
            Self::Available => "AVAILABLE",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "PARTIALLY_AVAILABLE" => Self::PartiallyAvailable,
            "AVAILABLE" => Self::Available,
            _ => Self::Unknown,
        }
    }
}

impl Default for MediaStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "tv" { Self::Tv } else { Self::Movie }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per globally unique title, keyed by the metadata-provider
/// catalog ID. Service fields point back at the owning DVR server and its
/// internal identifiers; the 4k variants are populated only by 4k-capable
/// servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i32,
    pub catalog_id: i32,
    /// Alternate external ID (TVDB for series, unset for movies).
    pub external_id: Option<i32>,
    pub kind: MediaKind,
    pub status: MediaStatus,
    pub status4k: MediaStatus,
    pub server_id: Option<i32>,
    pub server_id4k: Option<i32>,
    pub service_id: Option<i32>,
    pub service_id4k: Option<i32>,
    pub service_slug: Option<String>,
    pub service_slug4k: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub last_season_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl MediaRecord {
    #[must_use]
    pub fn new(catalog_id: i32, kind: MediaKind) -> Self {
        Self {
            id: 0,
            catalog_id,
            external_id: None,
            kind,
            status: MediaStatus::Unknown,
            status4k: MediaStatus::Unknown,
            server_id: None,
            server_id4k: None,
            service_id: None,
            service_id4k: None,
            service_slug: None,
            service_slug4k: None,
            added_at: None,
            last_season_change: None,
            seasons: Vec::new(),
        }
    }

    /// Number of seasons currently fully available for the given variant.
    #[must_use]
    pub fn available_season_count(&self, is4k: bool) -> usize {
        self.seasons
            .iter()
            .filter(|s| {
                let status = if is4k { s.status4k } else { s.status };
                status == MediaStatus::Available
            })
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub season_number: i32,
    pub status: MediaStatus,
    pub status4k: MediaStatus,
}

impl Season {
    #[must_use]
    pub const fn new(season_number: i32) -> Self {
        Self {
            season_number,
            status: MediaStatus::Unknown,
            status4k: MediaStatus::Unknown,
        }
    }
}

/// Per-season facts handed from the series pipeline to the reconciler.
/// Season 0 (specials) is filtered out before this is ever built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessableSeason {
    pub season_number: i32,
    pub episodes_available: i32,
    pub episodes_available4k: i32,
    pub total_episodes: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_sticky() {
        assert_eq!(
            MediaStatus::Available.apply(MediaStatus::Unknown),
            MediaStatus::Available
        );
        assert_eq!(
            MediaStatus::Available.apply(MediaStatus::PartiallyAvailable),
            MediaStatus::Available
        );
    }

    #[test]
    fn non_available_follows_observation() {
        assert_eq!(
            MediaStatus::PartiallyAvailable.apply(MediaStatus::Available),
            MediaStatus::Available
        );
        assert_eq!(
            MediaStatus::Processing.apply(MediaStatus::PartiallyAvailable),
            MediaStatus::PartiallyAvailable
        );
        assert_eq!(
            MediaStatus::PartiallyAvailable.apply(MediaStatus::Unknown),
            MediaStatus::Unknown
        );
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            MediaStatus::Unknown,
            MediaStatus::Pending,
            MediaStatus::Processing,
            MediaStatus::PartiallyAvailable,
            MediaStatus::Available,
        ] {
            assert_eq!(MediaStatus::parse(status.as_str()), status);
        }
        assert_eq!(MediaStatus::parse("garbage"), MediaStatus::Unknown);
    }

    #[test]
    fn available_season_count_is_per_variant() {
        let mut record = MediaRecord::new(100, MediaKind::Tv);
        record.seasons = vec![
            Season {
                season_number: 1,
                status: MediaStatus::Available,
                status4k: MediaStatus::Unknown,
            },
            Season {
                season_number: 2,
                status: MediaStatus::PartiallyAvailable,
                status4k: MediaStatus::Available,
            },
        ];
        assert_eq!(record.available_season_count(false), 1);
        assert_eq!(record.available_season_count(true), 1);
    }
}
