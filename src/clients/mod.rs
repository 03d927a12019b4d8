pub mod dvr;
pub mod external;
pub mod http;
pub mod radarr;
pub mod sonarr;
pub mod tmdb;

pub use external::{ExternalApi, IntegrationError};
pub use http::{HttpClient, RateLimit};
pub use radarr::RadarrClient;
pub use sonarr::SonarrClient;
pub use tmdb::TmdbClient;
