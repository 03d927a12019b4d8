use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub radarr: DvrServiceConfig,

    pub sonarr: DvrServiceConfig,

    pub tmdb: TmdbConfig,

    pub cache: CacheConfig,

    pub rate_limit: RateLimitConfig,

    pub scanner: ScannerConfig,

    pub scheduler: SchedulerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    pub http_timeout_seconds: u64,

    /// 0 = let tokio pick.
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:./data/availarr.db".to_string(),
            log_level: "info".to_string(),
            http_timeout_seconds: 30,
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5055,
            cors_allowed_origins: vec!["http://localhost:5055".to_string()],
        }
    }
}

/// One configured DVR server instance. Standard and 4k profiles pointing
/// at distinct instances are both listed; `is_4k` decides which status
/// variant the instance feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvrServerConfig {
    pub id: i32,

    pub hostname: String,

    pub port: u16,

    #[serde(default)]
    pub use_ssl: bool,

    #[serde(default)]
    pub base_path: String,

    pub api_key: String,

    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    #[serde(default)]
    pub is_4k: bool,
}

const fn default_true() -> bool {
    true
}

impl DvrServerConfig {
    /// Two entries describe the same physical instance when host, port and
    /// base path all match, regardless of their IDs or 4k flags.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        self.hostname == other.hostname
            && self.port == other.port
            && self.base_path == other.base_path
    }

    #[must_use]
    pub fn api_base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}{}/api/v3",
            self.hostname, self.port, self.base_path
        )
    }
}

/// Collapses accidental duplicates of the same instance while keeping
/// mirrored standard/4k entries that point at distinct instances.
#[must_use]
pub fn dedupe_servers(servers: &[DvrServerConfig]) -> Vec<DvrServerConfig> {
    let mut unique: Vec<DvrServerConfig> = Vec::new();
    for server in servers {
        if !unique.iter().any(|kept| kept.same_instance(server)) {
            unique.push(server.clone());
        }
    }
    unique
}

/// Servers worth polling: disabled entries are dropped before deduping so
/// a disabled duplicate cannot shadow an enabled mirror of the same
/// instance.
#[must_use]
pub fn active_servers(servers: &[DvrServerConfig]) -> Vec<DvrServerConfig> {
    let enabled: Vec<DvrServerConfig> = servers
        .iter()
        .filter(|s| s.sync_enabled)
        .cloned()
        .collect();
    dedupe_servers(&enabled)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DvrServiceConfig {
    pub servers: Vec<DvrServerConfig>,
}

impl DvrServiceConfig {
    /// Whether any configured server feeds the 4k variant. Gates the
    /// reconciler's 4k state machine.
    #[must_use]
    pub fn any_4k(&self) -> bool {
        self.servers.iter().any(|s| s.is_4k)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: String,

    pub base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How close to expiry a rolling read may get before it triggers a
    /// background refresh.
    pub stale_buffer_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_buffer_ms: crate::constants::DEFAULT_STALE_BUFFER_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Max requests inside the rolling window. None disables the cap.
    pub max_requests: Option<u32>,

    pub window_seconds: u64,

    pub max_requests_per_second: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: None,
            window_seconds: 10,
            max_requests_per_second: None,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn as_limit(&self) -> crate::clients::http::RateLimit {
        crate::clients::http::RateLimit {
            max_requests: self.max_requests,
            window_seconds: self.window_seconds,
            max_requests_per_second: self.max_requests_per_second,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub bundle_size: usize,

    pub bundle_delay_seconds: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            bundle_size: crate::constants::DEFAULT_BUNDLE_SIZE,
            bundle_delay_seconds: crate::constants::DEFAULT_BUNDLE_DELAY_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub scan_interval_minutes: u32,

    pub cron_expression: Option<String>,

    pub download_poll_seconds: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_minutes: 5,
            cron_expression: None,
            download_poll_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("availarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".availarr").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        for server in self.radarr.servers.iter().chain(&self.sonarr.servers) {
            if server.hostname.is_empty() {
                anyhow::bail!("DVR server {} has an empty hostname", server.id);
            }
            if server.api_key.is_empty() {
                anyhow::bail!("DVR server {} has an empty API key", server.id);
            }
        }

        if self.scanner.bundle_size == 0 {
            anyhow::bail!("Scanner bundle size must be > 0");
        }

        if self.scheduler.enabled
            && self.scheduler.scan_interval_minutes == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Scheduler interval must be > 0 or cron expression must be set");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: i32, hostname: &str, port: u16, base_path: &str, is_4k: bool) -> DvrServerConfig {
        DvrServerConfig {
            id,
            hostname: hostname.to_string(),
            port,
            use_ssl: false,
            base_path: base_path.to_string(),
            api_key: "key".to_string(),
            sync_enabled: true,
            is_4k,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.bundle_size, 20);
        assert_eq!(config.scanner.bundle_delay_seconds, 4);
        assert_eq!(config.cache.stale_buffer_ms, 10_000);
        assert_eq!(config.scheduler.scan_interval_minutes, 5);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [scanner]
            bundle_size = 50

            [[radarr.servers]]
            id = 1
            hostname = "radarr.local"
            port = 7878
            api_key = "abc"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scanner.bundle_size, 50);
        assert_eq!(config.radarr.servers.len(), 1);
        assert!(config.radarr.servers[0].sync_enabled);
        assert!(!config.radarr.servers[0].is_4k);
    }

    #[test]
    fn duplicate_instances_collapse() {
        let servers = vec![
            server(1, "dvr.local", 7878, "", false),
            server(2, "dvr.local", 7878, "", true),
            server(3, "dvr4k.local", 7878, "", true),
        ];
        let unique = dedupe_servers(&servers);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, 1);
        assert_eq!(unique[1].id, 3);
    }

    #[test]
    fn disabled_duplicate_does_not_shadow_enabled_mirror() {
        let mut first = server(1, "dvr.local", 7878, "", false);
        first.sync_enabled = false;
        let second = server(2, "dvr.local", 7878, "", true);

        let active = active_servers(&[first, second]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 2);
    }

    #[test]
    fn distinct_base_paths_are_distinct_instances() {
        let servers = vec![
            server(1, "dvr.local", 7878, "/a", false),
            server(2, "dvr.local", 7878, "/b", false),
        ];
        assert_eq!(dedupe_servers(&servers).len(), 2);
    }

    #[test]
    fn api_base_url_respects_ssl_and_base_path() {
        let mut s = server(1, "dvr.local", 7878, "/radarr", false);
        assert_eq!(s.api_base_url(), "http://dvr.local:7878/radarr/api/v3");
        s.use_ssl = true;
        assert_eq!(s.api_base_url(), "https://dvr.local:7878/radarr/api/v3");
    }

    #[test]
    fn any_4k_gates_on_flags() {
        let service = DvrServiceConfig {
            servers: vec![server(1, "a", 1, "", false), server(2, "b", 1, "", true)],
        };
        assert!(service.any_4k());
        let none = DvrServiceConfig {
            servers: vec![server(1, "a", 1, "", false)],
        };
        assert!(!none.any_4k());
    }
}
