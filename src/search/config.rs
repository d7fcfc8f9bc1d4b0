//! Search configuration.

use serde::Deserialize;

const DEFAULT_MAX_QUERY_LEN: usize = 256;
const DEFAULT_MIN_SUGGESTION_LEN: usize = 2;
const DEFAULT_LIMIT: u32 = 20;
const DEFAULT_MAX_LIMIT: u32 = 100;

/// Search tuning from `rivista.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Queries longer than this are rejected as invalid.
    pub max_query_len: usize,
    /// Prefixes shorter than this return no suggestions.
    pub min_suggestion_len: usize,
    /// Page size applied when a caller passes 0.
    pub default_limit: u32,
    /// Hard cap on the page size.
    pub max_limit: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_query_len: DEFAULT_MAX_QUERY_LEN,
            min_suggestion_len: DEFAULT_MIN_SUGGESTION_LEN,
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl SearchConfig {
    /// Clamp a requested page size into the configured bounds.
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        if limit == 0 {
            self.default_limit
        } else {
            limit.min(self.max_limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamping() {
        let config = SearchConfig::default();
        assert_eq!(config.clamp_limit(0), 20);
        assert_eq!(config.clamp_limit(7), 7);
        assert_eq!(config.clamp_limit(10_000), 100);
    }
}
