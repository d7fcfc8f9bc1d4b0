//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::NonZeroU32;
use std::str::FromStr;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;
use crate::index::IndexConfig;
use crate::search::SearchConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rivista";
const DEFAULT_KV_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub kv: KvSettings,
    pub database: DatabaseSettings,
    pub cache: CacheConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings from `config/default.*`, then `rivista.*`, then `RIVISTA__*`
/// environment variables, later sources winning.
pub fn load() -> Result<Settings, LoadError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
        .add_source(Environment::with_prefix("RIVISTA").separator("__"))
        .build()?
        .try_deserialize()?;

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    kv: RawKvSettings,
    database: RawDatabaseSettings,
    cache: CacheConfig,
    index: IndexConfig,
    search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            kv,
            database,
            cache,
            index,
            search,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            kv: build_kv_settings(kv)?,
            database: build_database_settings(database)?,
            cache,
            index,
            search,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_kv_settings(kv: RawKvSettings) -> Result<KvSettings, LoadError> {
    let url = kv.url.unwrap_or_else(|| DEFAULT_KV_URL.to_string());
    if url.trim().is_empty() {
        return Err(LoadError::invalid("kv.url", "url must not be empty"));
    }

    Ok(KvSettings { url })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_value)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert_eq!(settings.kv.url, DEFAULT_KV_URL);
        assert!(settings.database.url.is_none());
        assert_eq!(settings.database.max_connections.get(), 8);
        assert!(settings.cache.enabled);
        assert_eq!(settings.search.max_query_len, 256);
    }

    #[test]
    fn json_flag_selects_json_format() {
        let raw = RawSettings {
            logging: RawLoggingSettings {
                level: Some("debug".to_string()),
                json: Some(true),
            },
            ..Default::default()
        };
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn blank_database_url_reads_as_unset() {
        let raw = RawSettings {
            database: RawDatabaseSettings {
                url: Some("   ".to_string()),
                max_connections: None,
            },
            ..Default::default()
        };
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn zero_connections_rejected() {
        let raw = RawSettings {
            database: RawDatabaseSettings {
                url: None,
                max_connections: Some(0),
            },
            ..Default::default()
        };
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "database.max_connections"
        ));
    }

    #[test]
    fn bad_log_level_rejected() {
        let raw = RawSettings {
            logging: RawLoggingSettings {
                level: Some("chatty".to_string()),
                json: None,
            },
            ..Default::default()
        };
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "logging.level"
        ));
    }
}
