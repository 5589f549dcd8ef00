use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{Component, ScoringPreset, ScoringWeights, WeightsError};

/// Service configuration, one struct per TOML section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

/// Postgres connection. Without a URL the service runs on the in-memory store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Shared L2 tier; L1 only when unset.
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_ttl_secs(),
            l1_cache_size: default_l1_cache_size(),
        }
    }
}

fn default_ttl_secs() -> u64 { 300 }
fn default_l1_cache_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Candidates fetched from the store per request.
    #[serde(default = "default_pool_limit")]
    pub pool_limit: usize,
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_distance_km")]
    pub default_max_distance_km: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            pool_limit: default_pool_limit(),
            parallel_threshold: default_parallel_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            default_max_distance_km: default_max_distance_km(),
        }
    }
}

fn default_limit() -> usize { 50 }
fn default_max_limit() -> usize { 100 }
fn default_pool_limit() -> usize { 500 }
fn default_parallel_threshold() -> usize { 64 }
fn default_request_timeout_ms() -> u64 { 2_000 }
fn default_max_distance_km() -> f64 { 50.0 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub preset: ScoringPreset,
    /// Replaces the preset's table entirely when set.
    #[serde(default)]
    pub weights: Option<BTreeMap<Component, f64>>,
}

impl ScoringSettings {
    /// Resolve the active, validated weight table
    pub fn weights(&self) -> Result<ScoringWeights, WeightsError> {
        match &self.weights {
            Some(custom) => ScoringWeights::new(custom.iter().map(|(c, w)| (*c, *w))),
            None => Ok(ScoringWeights::preset(self.preset)),
        }
    }
}

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
    /// Layers, later wins: struct defaults, `config/default.toml`,
    /// `config/local.toml`, `FWBER__SECTION__KEY` env vars, `DATABASE_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., FWBER__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("FWBER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_database_url(settings)?;

        settings.try_deserialize()
    }

    /// Single explicit file plus env overrides, without `config/local`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FWBER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// `DATABASE_URL` wins over any configured database URL
fn apply_database_url(settings: Config) -> Result<Config, ConfigError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => Config::builder()
            .add_source(settings)
            .set_override("database.url", url)?
            .build(),
        _ => Ok(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(raw: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_weights() {
        let weights = ScoringSettings::default().weights().unwrap();
        assert_eq!(weights, ScoringWeights::preset(ScoringPreset::Compatibility));
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = from_toml("");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.matching.default_limit, 50);
        assert_eq!(settings.matching.max_limit, 100);
        assert_eq!(settings.matching.pool_limit, 500);
        assert!(settings.database.url.is_none());
        assert!(settings.cache.redis_url.is_none());
    }

    #[test]
    fn test_preset_selection() {
        let settings = from_toml("[scoring]\npreset = \"affinity\"\n");
        assert_eq!(
            settings.scoring.weights().unwrap(),
            ScoringWeights::preset(ScoringPreset::Affinity)
        );
    }

    #[test]
    fn test_custom_weights_must_sum_to_one() {
        let settings = from_toml("[scoring.weights]\nphysical = 0.6\nlocation = 0.3\n");
        assert!(matches!(
            settings.scoring.weights(),
            Err(WeightsError::InvalidSum(_))
        ));

        let settings = from_toml("[scoring.weights]\nphysical = 0.6\nlocation = 0.4\n");
        let weights = settings.scoring.weights().unwrap();
        assert_eq!(weights.get(Component::Location), 0.4);
    }
}
