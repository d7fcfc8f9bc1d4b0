//! Change consumer.
//!
//! Drains change events from the queue and executes the invalidation and
//! index maintenance each event implies. Every action is best-effort: a
//! failed invalidation or index write is logged and the pass continues, so
//! the mutation that published the event is never failed retroactively.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::index::IndexEngine;

use super::config::CacheConfig;
use super::domain::DomainCache;
use super::events::{ChangeEvent, EventKind, EventQueue};

const METRIC_CACHE_CONSUME_MS: &str = "rivista_cache_consume_ms";

/// Consumes change events and keeps cache and index consistent.
///
/// Per event the consumer:
/// 1. Tears down cache entries the change made stale (tag invalidation).
/// 2. Applies the matching index mutation (upsert or removal).
///
/// Cache teardown always runs before reindexing, so a concurrent reader
/// either sees the old entry or repopulates from post-change state, never a
/// fresh entry built from pre-change data.
pub struct ChangeConsumer {
    config: CacheConfig,
    cache: DomainCache,
    index: Option<Arc<IndexEngine>>,
    queue: Arc<EventQueue>,
}

impl ChangeConsumer {
    pub fn new(
        config: CacheConfig,
        cache: DomainCache,
        index: Arc<IndexEngine>,
        queue: Arc<EventQueue>,
    ) -> Self {
        Self {
            config,
            cache,
            index: Some(index),
            queue,
        }
    }

    /// Create a consumer without index access (index maintenance disabled).
    ///
    /// This is primarily for testing the invalidation side in isolation.
    #[cfg(test)]
    pub fn new_without_index(
        config: CacheConfig,
        cache: DomainCache,
        queue: Arc<EventQueue>,
    ) -> Self {
        Self {
            config,
            cache,
            index: None,
            queue,
        }
    }

    /// Consume pending events in FIFO order.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        info!(event_count, event_ids = ?event_ids, "Change consumption starting");

        for event in events {
            self.apply(&event).await;
        }

        info!(event_count, "Change consumption complete");
        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    async fn apply(&self, event: &ChangeEvent) {
        match &event.kind {
            EventKind::PostCreated { post_id } => {
                self.cache.invalidate_posts().await;
                self.cache.invalidate_search().await;
                self.upsert_index(*post_id).await;
            }
            EventKind::PostUpdated {
                post_id,
                category_id,
            } => {
                // Teardown precedes reindex: the cached entry for this post
                // must be gone before the index snapshot changes.
                self.cache.invalidate_post(*post_id).await;
                self.cache.invalidate_posts().await;
                self.cache.invalidate_search().await;
                if let Some(category_id) = category_id {
                    self.cache.invalidate_category(*category_id).await;
                }
                self.upsert_index(*post_id).await;
            }
            EventKind::PostDeleted {
                post_id,
                category_id,
            } => {
                self.cache.invalidate_post(*post_id).await;
                self.cache.invalidate_posts().await;
                self.cache.invalidate_search().await;
                if let Some(category_id) = category_id {
                    self.cache.invalidate_category(*category_id).await;
                }
                self.remove_from_index(*post_id).await;
            }
            EventKind::CategoryChanged { category_id } => {
                self.cache.invalidate_categories().await;
                self.cache.invalidate_category(*category_id).await;
                self.cache.invalidate_search().await;
            }
            EventKind::UserUpdated { user_id: _ } => {
                self.cache.invalidate_users().await;
            }
        }
    }

    async fn upsert_index(&self, post_id: Uuid) {
        let Some(index) = &self.index else {
            return;
        };
        match index.index_document(post_id).await {
            Ok(true) => {}
            Ok(false) => {
                // Not indexable anymore (unpublished between event and
                // consumption); drop whatever the index still holds.
                self.remove_from_index(post_id).await;
            }
            Err(err) => warn!(%post_id, %err, "index upsert failed; postings may be stale"),
        }
    }

    async fn remove_from_index(&self, post_id: Uuid) {
        let Some(index) = &self.index else {
            return;
        };
        if let Err(err) = index.remove_document(post_id).await {
            warn!(%post_id, %err, "index removal failed; postings may be stale");
        }
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::manager::{SetOptions, SmartCache};
    use crate::cache::{DomainCache, keys};
    use crate::domain::SortOrder;
    use crate::kv::MemoryStore;

    fn create_consumer() -> ChangeConsumer {
        let config = CacheConfig::default();
        let cache = SmartCache::new(Arc::new(MemoryStore::new()), config.clone());
        let cache = DomainCache::new(Arc::new(cache));
        let queue = Arc::new(EventQueue::new());

        ChangeConsumer::new_without_index(config, cache, queue)
    }

    #[tokio::test]
    async fn consume_empty_queue_returns_false() {
        let consumer = create_consumer();
        assert!(!consumer.consume().await);
    }

    #[tokio::test]
    async fn consume_drains_and_processes_events() {
        let consumer = create_consumer();

        consumer.queue.publish(EventKind::UserUpdated {
            user_id: Uuid::nil(),
        });
        consumer.queue.publish(EventKind::CategoryChanged {
            category_id: Uuid::nil(),
        });

        assert_eq!(consumer.queue.len(), 2);
        assert!(consumer.consume().await);
        assert!(consumer.queue.is_empty());
    }

    #[tokio::test]
    async fn consume_respects_batch_limit() {
        let config = CacheConfig {
            consume_batch_limit: 2,
            ..Default::default()
        };
        let cache = SmartCache::new(Arc::new(MemoryStore::new()), config.clone());
        let cache = DomainCache::new(Arc::new(cache));
        let queue = Arc::new(EventQueue::new());
        let consumer = ChangeConsumer::new_without_index(config, cache, queue);

        for _ in 0..5 {
            consumer.queue.publish(EventKind::UserUpdated {
                user_id: Uuid::nil(),
            });
        }

        assert_eq!(consumer.queue.len(), 5);
        consumer.consume().await;
        assert_eq!(consumer.queue.len(), 3);
    }

    #[tokio::test]
    async fn post_update_tears_down_post_and_search_entries() {
        let consumer = create_consumer();
        let post_id = Uuid::new_v4();

        consumer
            .cache
            .cache_post(post_id, None, &"cached".to_string())
            .await;
        consumer
            .cache
            .cache_search_results("trade", None, SortOrder::Relevance, &vec![1_u32])
            .await;

        consumer.queue.publish(EventKind::PostUpdated {
            post_id,
            category_id: None,
        });
        consumer.consume().await;

        assert!(consumer.cache.get_post::<String>(post_id).await.is_none());
        assert!(
            consumer
                .cache
                .get_search_results::<Vec<u32>>("trade", None, SortOrder::Relevance)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn category_change_spares_unrelated_entries() {
        let consumer = create_consumer();
        let cat = Uuid::new_v4();
        let in_cat = Uuid::new_v4();
        let outside = Uuid::new_v4();

        consumer.cache.cache_post(in_cat, Some(cat), &1_u32).await;
        consumer.cache.cache_post(outside, None, &2_u32).await;
        // An entry outside every touched tag survives.
        consumer
            .cache
            .inner()
            .set("other", &3_u32, SetOptions::namespaced(keys::NS_ANALYTICS))
            .await;

        consumer
            .queue
            .publish(EventKind::CategoryChanged { category_id: cat });
        consumer.consume().await;

        assert!(consumer.cache.get_post::<u32>(in_cat).await.is_none());
        assert_eq!(consumer.cache.get_post::<u32>(outside).await, Some(2));
        assert_eq!(
            consumer
                .cache
                .inner()
                .get::<u32>("other", keys::NS_ANALYTICS)
                .await,
            Some(3)
        );
    }

    #[tokio::test]
    async fn user_update_clears_user_entries_only() {
        let consumer = create_consumer();
        let user = Uuid::new_v4();
        let post = Uuid::new_v4();

        consumer
            .cache
            .cache_user_posts(user, Some("draft"), &1_u32)
            .await;
        consumer.cache.cache_post(post, None, &2_u32).await;

        consumer
            .queue
            .publish(EventKind::UserUpdated { user_id: user });
        consumer.consume().await;

        assert!(
            consumer
                .cache
                .get_user_posts::<u32>(user, Some("draft"))
                .await
                .is_none()
        );
        assert_eq!(consumer.cache.get_post::<u32>(post).await, Some(2));
    }
}
