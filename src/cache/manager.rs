//! Generic namespaced, tagged, TTL'd cache over the store adapter.
//!
//! Failure policy: the cache is never load-bearing. Every method catches
//! store errors, logs them, and returns a safe default (`false`, `None`, `0`)
//! so callers treat an unavailable store as "always a miss", never as an
//! exception.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::kv::KvStore;

use super::config::CacheConfig;
use super::entry::{CacheEntry, CacheMeta};
use super::keys;

const METRIC_CACHE_HIT: &str = "rivista_cache_hit_total";
const METRIC_CACHE_MISS: &str = "rivista_cache_miss_total";
const METRIC_CACHE_INVALIDATION: &str = "rivista_cache_invalidation_total";

const DELETE_CHUNK: usize = 200;

/// Options for [`SmartCache::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Defaults to the configured TTL when unset.
    pub ttl: Option<Duration>,
    /// Tags to attach for group invalidation.
    pub tags: Vec<String>,
    /// Defaults to the `app` namespace when unset.
    pub namespace: Option<String>,
}

impl SetOptions {
    pub fn namespaced(namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-namespace key count for diagnostics.
#[derive(Debug, Clone)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: u64,
}

/// Diagnostic snapshot; never load-bearing for correctness.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub namespaces: Vec<NamespaceStats>,
    pub total_keys: u64,
    pub round_trip_ms: f64,
    pub server_version: String,
}

#[derive(Debug, Clone)]
pub struct CacheHealth {
    pub healthy: bool,
    pub round_trip_ms: f64,
    pub server_version: String,
}

/// Generic tagged cache manager.
pub struct SmartCache {
    kv: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl SmartCache {
    pub fn new(kv: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Write a value entry, its metadata twin, and the tag memberships.
    ///
    /// Returns false (and logs) on serialization or store failure; never
    /// raises. The metadata entry outlives the value by the configured grace
    /// period, and each tag set's TTL is extended to outlive its
    /// longest-lived member.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: SetOptions) -> bool {
        if !self.config.enabled {
            return false;
        }

        let namespace = options.namespace.as_deref().unwrap_or(keys::NS_APP);
        let ttl = options.ttl.unwrap_or_else(|| self.config.default_ttl());
        let composed = keys::composed_key(namespace, key);

        let payload = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(namespace, key, %err, "cache set skipped: value not serializable");
                return false;
            }
        };

        if let Err(err) = self.kv.set_ex(&composed, &payload, ttl).await {
            warn!(namespace, key, %err, "cache set failed");
            return false;
        }

        let meta = CacheMeta {
            namespace: namespace.to_string(),
            key: composed.clone(),
            stored_at: OffsetDateTime::now_utc(),
            ttl_secs: ttl.as_secs(),
            tags: options.tags.clone(),
        };
        let meta_ttl = ttl + self.config.metadata_grace();
        match serde_json::to_string(&meta) {
            Ok(json) => {
                if let Err(err) = self
                    .kv
                    .set_ex(&keys::meta_key(namespace, key), &json, meta_ttl)
                    .await
                {
                    warn!(namespace, key, %err, "cache metadata write failed");
                }
            }
            Err(err) => warn!(namespace, key, %err, "cache metadata not serializable"),
        }

        for tag in &options.tags {
            self.attach_tag(tag, &composed, meta_ttl).await;
        }

        true
    }

    /// Add a composed key to a tag set and keep the set alive at least as
    /// long as its longest-lived member.
    async fn attach_tag(&self, tag: &str, composed: &str, member_ttl: Duration) {
        let tag_key = keys::tag_key(tag);
        if let Err(err) = self.kv.sadd(&tag_key, &[composed.to_string()]).await {
            warn!(tag, %err, "tag membership write failed");
            return;
        }
        let extend = match self.kv.ttl(&tag_key).await {
            Ok(Some(remaining)) => remaining < member_ttl,
            // Freshly created sets carry no expiry yet.
            Ok(None) => true,
            Err(err) => {
                warn!(tag, %err, "tag ttl probe failed");
                false
            }
        };
        if extend
            && let Err(err) = self.kv.expire(&tag_key, member_ttl).await
        {
            warn!(tag, %err, "tag ttl extension failed");
        }
    }

    /// Plain lookup; `None` on miss, deserialization failure, or store error.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, namespace: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let composed = keys::composed_key(namespace, key);
        let raw = match self.kv.get(&composed).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(namespace, key, %err, "cache get failed; treating as miss");
                counter!(METRIC_CACHE_MISS, "namespace" => namespace.to_string()).increment(1);
                return None;
            }
        };

        let Some(json) = raw else {
            counter!(METRIC_CACHE_MISS, "namespace" => namespace.to_string()).increment(1);
            return None;
        };

        match serde_json::from_str(&json) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "namespace" => namespace.to_string()).increment(1);
                Some(value)
            }
            Err(err) => {
                warn!(namespace, key, %err, "cache entry undecodable; dropping it");
                let _ = self
                    .kv
                    .del(&[composed, keys::meta_key(namespace, key)])
                    .await;
                counter!(METRIC_CACHE_MISS, "namespace" => namespace.to_string()).increment(1);
                None
            }
        }
    }

    /// Lookup returning the value together with its metadata twin.
    pub async fn get_with_meta<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: &str,
    ) -> Option<CacheEntry<T>> {
        let value: T = self.get(key, namespace).await?;
        let meta_raw = match self.kv.get(&keys::meta_key(namespace, key)).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(namespace, key, %err, "cache metadata read failed");
                None
            }
        };
        let meta = meta_raw
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_else(|| CacheMeta {
                namespace: namespace.to_string(),
                key: keys::composed_key(namespace, key),
                stored_at: OffsetDateTime::now_utc(),
                ttl_secs: 0,
                tags: Vec::new(),
            });
        Some(CacheEntry { value, meta })
    }

    /// Remove a value entry and its metadata twin.
    pub async fn delete(&self, key: &str, namespace: &str) -> bool {
        let targets = [
            keys::composed_key(namespace, key),
            keys::meta_key(namespace, key),
        ];
        match self.kv.del(&targets).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                warn!(namespace, key, %err, "cache delete failed");
                false
            }
        }
    }

    /// Invalidate every entry carrying a tag; the one mechanism for tearing
    /// down an open-ended set of derived entries from a single semantic
    /// event. Returns the number of live entries actually removed, so
    /// members that already expired or were deleted through another tag do
    /// not inflate the count. Returns 0 for an unknown tag.
    pub async fn invalidate_by_tag(&self, tag: &str) -> u64 {
        let tag_key = keys::tag_key(tag);
        let members = match self.kv.smembers(&tag_key).await {
            Ok(members) => members,
            Err(err) => {
                warn!(tag, %err, "tag lookup failed; nothing invalidated");
                return 0;
            }
        };

        if members.is_empty() {
            debug!(tag, "tag unknown or already empty");
            let _ = self.kv.del(&[tag_key]).await;
            return 0;
        }

        // Metadata twins and the tag set ride along uncounted.
        let mut extras: Vec<String> = members
            .iter()
            .map(|member| format!("{member}:meta"))
            .collect();
        extras.push(tag_key);
        for chunk in extras.chunks(DELETE_CHUNK) {
            if let Err(err) = self.kv.del(chunk).await {
                warn!(tag, %err, "tag invalidation delete failed");
            }
        }

        let mut invalidated = 0;
        for chunk in members.chunks(DELETE_CHUNK) {
            match self.kv.del(chunk).await {
                Ok(removed) => invalidated += removed,
                Err(err) => warn!(tag, %err, "tag invalidation delete failed"),
            }
        }

        info!(tag, invalidated, "cache tag invalidated");
        counter!(METRIC_CACHE_INVALIDATION, "mode" => "tag").increment(invalidated);
        invalidated
    }

    /// Scan-and-delete every entry under a namespace prefix; used for coarse
    /// resets such as after a full reindex.
    pub async fn invalidate_by_namespace(&self, namespace: &str) -> u64 {
        let matched = match self.kv.scan(&keys::namespace_pattern(namespace)).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(namespace, %err, "namespace scan failed; nothing invalidated");
                return 0;
            }
        };

        if matched.is_empty() {
            return 0;
        }

        // Count value entries only; their metadata twins ride along.
        let entries = matched.iter().filter(|k| !k.ends_with(":meta")).count() as u64;

        let mut removed = 0;
        for chunk in matched.chunks(DELETE_CHUNK) {
            match self.kv.del(chunk).await {
                Ok(n) => removed += n,
                Err(err) => warn!(namespace, %err, "namespace invalidation delete failed"),
            }
        }

        info!(
            namespace,
            entries,
            keys_removed = removed,
            "cache namespace invalidated"
        );
        counter!(METRIC_CACHE_INVALIDATION, "mode" => "namespace").increment(entries);
        entries
    }

    /// Key counts per known namespace plus a store round trip; diagnostic
    /// only.
    pub async fn stats(&self) -> CacheStats {
        let mut namespaces = Vec::new();
        for namespace in [
            keys::NS_APP,
            keys::NS_POSTS,
            keys::NS_SEARCH,
            keys::NS_CATEGORIES,
            keys::NS_USERS,
            keys::NS_ANALYTICS,
        ] {
            let entries = match self.kv.scan(&keys::namespace_pattern(namespace)).await {
                Ok(matched) => matched.iter().filter(|k| !k.ends_with(":meta")).count() as u64,
                Err(err) => {
                    warn!(namespace, %err, "namespace stats scan failed");
                    0
                }
            };
            namespaces.push(NamespaceStats {
                namespace: namespace.to_string(),
                entries,
            });
        }

        let health = self.health_check().await;
        let total_keys = self.kv.dbsize().await.unwrap_or(0);

        CacheStats {
            namespaces,
            total_keys,
            round_trip_ms: health.round_trip_ms,
            server_version: health.server_version,
        }
    }

    /// Ping the store and report latency and server version.
    pub async fn health_check(&self) -> CacheHealth {
        let started = Instant::now();
        let healthy = match self.kv.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "cache health ping failed");
                false
            }
        };
        let round_trip_ms = started.elapsed().as_secs_f64() * 1000.0;
        let server_version = if healthy {
            self.kv
                .server_info()
                .await
                .unwrap_or_else(|_| "unknown".to_string())
        } else {
            "unreachable".to_string()
        };
        CacheHealth {
            healthy,
            round_trip_ms,
            server_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn cache() -> SmartCache {
        SmartCache::new(Arc::new(MemoryStore::new()), CacheConfig::default())
    }

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = cache();

        assert!(cache.get::<String>("k", "app").await.is_none());
        assert!(
            cache
                .set("k", &"hello".to_string(), SetOptions::default())
                .await
        );
        assert_eq!(
            cache.get::<String>("k", "app").await.as_deref(),
            Some("hello")
        );

        assert!(cache.delete("k", "app").await);
        assert!(cache.get::<String>("k", "app").await.is_none());
    }

    #[tokio::test]
    async fn get_with_meta_reports_tags_and_ttl() {
        let cache = cache();
        let options = SetOptions::namespaced("posts")
            .with_ttl(Duration::from_secs(120))
            .with_tags(["posts", "content"]);
        cache.set("42", &7_u32, options).await;

        let entry = cache.get_with_meta::<u32>("42", "posts").await.unwrap();
        assert_eq!(entry.value, 7);
        assert_eq!(entry.meta.ttl_secs, 120);
        assert_eq!(entry.meta.tags, vec!["posts", "content"]);
    }

    #[tokio::test]
    async fn tag_invalidation_removes_all_members() {
        let cache = cache();
        let tagged = |tags: &[&str]| {
            SetOptions::namespaced("app").with_tags(tags.iter().map(|t| t.to_string()))
        };

        cache.set("k1", &"v1", tagged(&["t"])).await;
        cache.set("k2", &"v2", tagged(&["t", "u"])).await;

        assert_eq!(cache.invalidate_by_tag("t").await, 2);
        assert!(cache.get::<String>("k1", "app").await.is_none());
        assert!(cache.get::<String>("k2", "app").await.is_none());

        // The second tag still names k2, but the entry is already gone, so
        // nothing counts as invalidated.
        assert_eq!(cache.invalidate_by_tag("u").await, 0);
    }

    #[tokio::test]
    async fn tag_invalidation_counts_live_entries_only() {
        let kv = Arc::new(MemoryStore::new());
        let cache = SmartCache::new(kv.clone(), CacheConfig::default());

        cache
            .set("live", &"v", SetOptions::default().with_tags(["t"]))
            .await;
        cache
            .set("expired", &"v", SetOptions::default().with_tags(["t"]))
            .await;

        // Expire one member behind the cache's back; the tag set still
        // names it.
        use crate::kv::KvStore;
        kv.set_ex("cache:app:expired", "\"v\"", Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(cache.invalidate_by_tag("t").await, 1);
    }

    #[tokio::test]
    async fn unknown_tag_invalidates_nothing() {
        let cache = cache();
        assert_eq!(cache.invalidate_by_tag("never-used").await, 0);
    }

    #[tokio::test]
    async fn namespace_invalidation_is_scoped() {
        let cache = cache();
        cache
            .set("a", &1_u32, SetOptions::namespaced("posts"))
            .await;
        cache
            .set("b", &2_u32, SetOptions::namespaced("posts"))
            .await;
        cache
            .set("q", &3_u32, SetOptions::namespaced("search"))
            .await;

        assert_eq!(cache.invalidate_by_namespace("posts").await, 2);
        assert!(cache.get::<u32>("a", "posts").await.is_none());
        assert!(cache.get::<u32>("b", "posts").await.is_none());
        assert_eq!(cache.get::<u32>("q", "search").await, Some(3));
    }

    #[tokio::test]
    async fn disabled_cache_is_always_a_miss() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = SmartCache::new(Arc::new(MemoryStore::new()), config);

        assert!(!cache.set("k", &"v", SetOptions::default()).await);
        assert!(cache.get::<String>("k", "app").await.is_none());
    }

    #[tokio::test]
    async fn stats_count_value_entries_per_namespace() {
        let cache = cache();
        cache
            .set("a", &1_u32, SetOptions::namespaced("posts"))
            .await;
        cache
            .set("q", &2_u32, SetOptions::namespaced("search"))
            .await;

        let stats = cache.stats().await;
        let posts = stats
            .namespaces
            .iter()
            .find(|ns| ns.namespace == "posts")
            .unwrap();
        assert_eq!(posts.entries, 1);
        assert!(stats.total_keys >= 4); // two values + two metadata twins

        let health = cache.health_check().await;
        assert!(health.healthy);
        assert_eq!(health.server_version, "memory");
    }

    #[tokio::test]
    async fn undecodable_entry_reads_as_miss_and_is_dropped() {
        let kv = Arc::new(MemoryStore::new());
        let cache = SmartCache::new(kv.clone(), CacheConfig::default());

        use crate::kv::KvStore;
        kv.set_ex("cache:app:bad", "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get::<u32>("bad", "app").await.is_none());
        assert!(kv.get("cache:app:bad").await.unwrap().is_none());
    }
}
