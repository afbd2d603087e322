use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::classifier::DEFAULT_CHECK_TYPE;
use crate::core::screener::{
    ScreeningPolicy, CACHE_TTL_HOURS, ENRICHMENT_TIMEOUT_SECS, STORE_TIMEOUT_SECS,
};

/// Longest accepted cache TTL (ten years)
const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Clone, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_check_type")]
    pub check_type: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// Lifetime assumed for tokens that carry no `exp` claim
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("check_type", &self.check_type)
            .field("timeout_secs", &self.timeout_secs)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

fn default_check_type() -> String { DEFAULT_CHECK_TYPE.to_string() }
fn default_provider_timeout_secs() -> u64 { 30 }
fn default_token_ttl_secs() -> u64 { 3300 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Postgres,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default)]
    pub allow_name_only_reuse: bool,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: None,
            ttl_hours: default_ttl_hours(),
            allow_name_only_reuse: false,
            store_timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_cache_backend() -> CacheBackend { CacheBackend::Postgres }
fn default_ttl_hours() -> i64 { CACHE_TTL_HOURS }
fn default_store_timeout_secs() -> u64 { STORE_TIMEOUT_SECS }

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSettings {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: Option<String>,
    #[serde(default = "default_enrichment_timeout_secs")]
    pub timeout_secs: u64,
    pub context: Option<String>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_secs: default_enrichment_timeout_secs(),
            context: None,
        }
    }
}

fn default_enrichment_timeout_secs() -> u64 { ENRICHMENT_TIMEOUT_SECS }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with SCREEN_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SCREEN_)
            // e.g., SCREEN__PROVIDER__BASE_URL -> provider.base_url
            .add_source(
                Environment::with_prefix("SCREEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SCREEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the screener cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_hours <= 0 || self.cache.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::Message(format!(
                "cache.ttl_hours must be between 1 and {}, got {}",
                MAX_TTL_HOURS, self.cache.ttl_hours
            )));
        }

        if self.cache.store_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "cache.store_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Reuse and enrichment policy for the screener
    pub fn screening_policy(&self) -> ScreeningPolicy {
        ScreeningPolicy {
            cache_ttl: chrono::Duration::hours(self.cache.ttl_hours),
            allow_name_only_reuse: self.cache.allow_name_only_reuse,
            enrichment_timeout: Duration::from_secs(self.enrichment.timeout_secs),
            store_timeout: Duration::from_secs(self.cache.store_timeout_secs),
            enrichment_context: self.enrichment.context.clone(),
        }
    }
}

/// Apply the well-known environment variables on top of the layered config
///
/// These are the names the deployment already exports for other services,
/// so they win over the prefixed `SCREEN__` form.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("ATLAS_BASE_URL", "provider.base_url"),
        ("ATLAS_EMAIL", "provider.email"),
        ("ATLAS_PASSWORD", "provider.password"),
        ("REDIS_URL", "cache.redis_url"),
        ("ANALYSIS_ENDPOINT", "enrichment.endpoint"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
