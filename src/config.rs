//! Configuration management for the catalog client

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Host the application runs on; decides production vs development routing
    pub host: String,
    /// Fixed origin used when running on a non-local host
    pub production_origin: String,
    /// Local development proxy used otherwise
    pub dev_proxy: String,
    /// Request timeout; none by default, the transport's own limits apply
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds an unsubscribed entry survives its last read
    pub keep_unused_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for a daily rolling log file, in addition to stderr
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

static BASE_URL: OnceCell<String> = OnceCell::new();

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (CATALOG_API__HOST, CATALOG_CACHE__KEEP_UNUSED_SECS, ...)
            .add_source(
                Environment::with_prefix("CATALOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Override API base origin from API_URL env var if present
            .set_override_option("api.production_origin", env::var("API_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl ApiConfig {
    /// Pick the production origin on a remote host, the dev proxy otherwise
    pub fn resolve_base_url(&self) -> String {
        if is_local_host(&self.host) {
            self.dev_proxy.clone()
        } else {
            self.production_origin.clone()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl CacheConfig {
    pub fn keep_unused(&self) -> Duration {
        Duration::from_secs(self.keep_unused_secs)
    }
}

/// Process-wide base URL. The first call resolves it; later calls return the
/// same value whatever config they pass.
pub fn base_url(config: &ApiConfig) -> &'static str {
    BASE_URL.get_or_init(|| {
        let url = config.resolve_base_url();
        tracing::info!("API base URL: {}", url);
        url
    })
}

fn is_local_host(host: &str) -> bool {
    let host = host.trim();
    let name = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else if host.matches(':').count() == 1 {
        host.split(':').next().unwrap_or(host)
    } else {
        host
    };
    matches!(name, "" | "localhost" | "127.0.0.1" | "::1" | "0.0.0.0")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            production_origin: "https://library-catalog-api.vercel.app/api".to_string(),
            dev_proxy: "http://localhost:5000/api".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            keep_unused_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}
