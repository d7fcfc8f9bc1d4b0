//! Index configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MAX_TOKENS_PER_DOC: usize = 500;
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 60 * 60 * 24 * 30;

/// Index tuning from `rivista.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Cap on tokens indexed per document; the longest documents index
    /// their first N distinct tokens only.
    pub max_tokens_per_doc: usize,
    /// Snapshot expiry. Long by design: any snapshot older than this that
    /// was never reindexed reads as a stale posting and drops out of
    /// results.
    pub snapshot_ttl_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_doc: DEFAULT_MAX_TOKENS_PER_DOC,
            snapshot_ttl_secs: DEFAULT_SNAPSHOT_TTL_SECS,
        }
    }
}

impl IndexConfig {
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}
