//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 600;
const DEFAULT_METADATA_GRACE_SECS: u64 = 60;
const DEFAULT_POST_TTL_SECS: u64 = 600;
const DEFAULT_SEARCH_TTL_SECS: u64 = 300;
const DEFAULT_SUGGESTION_TTL_SECS: u64 = 600;
const DEFAULT_CATEGORY_TTL_SECS: u64 = 1800;
const DEFAULT_USER_TTL_SECS: u64 = 900;
const DEFAULT_ANALYTICS_TTL_SECS: u64 = 3600;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

/// Cache tuning from `rivista.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off, every operation is a no-op miss.
    pub enabled: bool,
    /// TTL applied when a caller does not pick one.
    pub default_ttl_secs: u64,
    /// How long metadata entries outlive their value entry, so introspection
    /// works slightly past expiry.
    pub metadata_grace_secs: u64,
    pub post_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub suggestion_ttl_secs: u64,
    pub category_ttl_secs: u64,
    pub user_ttl_secs: u64,
    pub analytics_ttl_secs: u64,
    /// Maximum change events drained per consumption pass.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: DEFAULT_TTL_SECS,
            metadata_grace_secs: DEFAULT_METADATA_GRACE_SECS,
            post_ttl_secs: DEFAULT_POST_TTL_SECS,
            search_ttl_secs: DEFAULT_SEARCH_TTL_SECS,
            suggestion_ttl_secs: DEFAULT_SUGGESTION_TTL_SECS,
            category_ttl_secs: DEFAULT_CATEGORY_TTL_SECS,
            user_ttl_secs: DEFAULT_USER_TTL_SECS,
            analytics_ttl_secs: DEFAULT_ANALYTICS_TTL_SECS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn metadata_grace(&self) -> Duration {
        Duration::from_secs(self.metadata_grace_secs)
    }

    pub fn post_ttl(&self) -> Duration {
        Duration::from_secs(self.post_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn suggestion_ttl(&self) -> Duration {
        Duration::from_secs(self.suggestion_ttl_secs)
    }

    pub fn category_ttl(&self) -> Duration {
        Duration::from_secs(self.category_ttl_secs)
    }

    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }

    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_ttl_secs, 600);
        assert_eq!(config.metadata_grace_secs, 60);
        assert_eq!(config.search_ttl_secs, 300);
        assert_eq!(config.category_ttl_secs, 1800);
        assert_eq!(config.user_ttl_secs, 900);
        assert_eq!(config.analytics_ttl_secs, 3600);
        assert_eq!(config.consume_batch_limit, 100);
    }

    #[test]
    fn durations_match_seconds() {
        let config = CacheConfig::default();
        assert_eq!(config.search_ttl(), Duration::from_secs(300));
        assert_eq!(config.metadata_grace(), Duration::from_secs(60));
    }
}
