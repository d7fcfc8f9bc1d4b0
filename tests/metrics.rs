//! Counter emission from the cache layer, observed through a debugging
//! recorder.

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use rivista_search::cache::{CacheConfig, SetOptions, SmartCache};
use rivista_search::kv::MemoryStore;

#[tokio::test]
async fn cache_lookups_emit_hit_and_miss_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("no other recorder installed");

    let cache = SmartCache::new(Arc::new(MemoryStore::new()), CacheConfig::default());

    assert!(cache.get::<String>("absent", "posts").await.is_none());
    cache
        .set("present", &"v".to_string(), SetOptions::namespaced("posts"))
        .await;
    assert!(cache.get::<String>("present", "posts").await.is_some());

    let mut hits = 0;
    let mut misses = 0;
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        if let DebugValue::Counter(count) = value {
            match key.key().name() {
                "rivista_cache_hit_total" => hits += count,
                "rivista_cache_miss_total" => misses += count,
                _ => {}
            }
        }
    }
    assert_eq!(hits, 1);
    assert_eq!(misses, 1);
}
