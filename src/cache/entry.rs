//! Typed cache entry shapes.
//!
//! Serialization lives at the store-adapter boundary; callers only ever see
//! these types, never raw JSON.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Metadata twin written next to every value entry.
///
/// Stored with a grace period past the value's TTL so `get_with_meta` and
/// stats can still describe an entry that just expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub namespace: String,
    pub key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    pub ttl_secs: u64,
    pub tags: Vec<String>,
}

/// A cached value together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub meta: CacheMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_serde_round_trip() {
        let meta = CacheMeta {
            namespace: "search".to_string(),
            key: "search:policy:all:views".to_string(),
            stored_at: OffsetDateTime::now_utc(),
            ttl_secs: 300,
            tags: vec!["search".to_string(), "posts".to_string()],
        };

        let json = serde_json::to_string(&meta).unwrap();
        let back: CacheMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
