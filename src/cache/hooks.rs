//! Mutation hooks.
//!
//! High-level API mutation paths call after a successful write. Publishes
//! the matching change event and optionally drives a consumption pass
//! immediately.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::consumer::ChangeConsumer;
use super::events::{EventKind, EventQueue};

/// Entry point for content mutations to keep cache and index fresh.
///
/// Hooks never fail the mutation that invoked them: publishing is
/// infallible and consumption swallows its own errors.
///
/// # Usage
///
/// ```ignore
/// // After a successful post update:
/// hooks.post_updated(post.id, post.category_id).await;
/// ```
pub struct MutationHooks {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<ChangeConsumer>,
}

impl MutationHooks {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<ChangeConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// With `consume_now` false the event waits for a background pass or the
    /// next explicit consumption.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.enabled {
            debug!(event_kind = kind.label(), "Mutation hook skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    pub async fn post_created(&self, post_id: Uuid) {
        self.trigger(EventKind::PostCreated { post_id }, true).await;
    }

    /// `category_id` is the post's category before the update, when known.
    pub async fn post_updated(&self, post_id: Uuid, category_id: Option<Uuid>) {
        self.trigger(
            EventKind::PostUpdated {
                post_id,
                category_id,
            },
            true,
        )
        .await;
    }

    pub async fn post_deleted(&self, post_id: Uuid, category_id: Option<Uuid>) {
        self.trigger(
            EventKind::PostDeleted {
                post_id,
                category_id,
            },
            true,
        )
        .await;
    }

    pub async fn category_changed(&self, category_id: Uuid) {
        self.trigger(EventKind::CategoryChanged { category_id }, true)
            .await;
    }

    pub async fn user_updated(&self, user_id: Uuid) {
        self.trigger(EventKind::UserUpdated { user_id }, true).await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<ChangeConsumer> {
        &self.consumer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DomainCache;
    use crate::cache::manager::SmartCache;
    use crate::kv::MemoryStore;

    fn create_hooks(config: CacheConfig) -> MutationHooks {
        let cache = SmartCache::new(Arc::new(MemoryStore::new()), config.clone());
        let cache = DomainCache::new(Arc::new(cache));
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(ChangeConsumer::new_without_index(
            config.clone(),
            cache,
            queue.clone(),
        ));

        MutationHooks::new(config, queue, consumer)
    }

    #[tokio::test]
    async fn trigger_publishes_event() {
        let hooks = create_hooks(CacheConfig::default());

        assert!(hooks.queue.is_empty());
        hooks
            .trigger(
                EventKind::PostCreated {
                    post_id: Uuid::nil(),
                },
                false,
            )
            .await;
        assert_eq!(hooks.queue.len(), 1);
    }

    #[tokio::test]
    async fn trigger_respects_disabled_config() {
        let hooks = create_hooks(CacheConfig {
            enabled: false,
            ..Default::default()
        });

        hooks.post_created(Uuid::nil()).await;
        assert!(hooks.queue.is_empty());
    }

    #[tokio::test]
    async fn convenience_methods_publish_and_consume() {
        let hooks = create_hooks(CacheConfig::default());

        hooks.post_created(Uuid::nil()).await;
        hooks.post_updated(Uuid::nil(), None).await;
        hooks.post_deleted(Uuid::nil(), Some(Uuid::nil())).await;
        hooks.category_changed(Uuid::nil()).await;
        hooks.user_updated(Uuid::nil()).await;

        assert!(hooks.queue.is_empty());
    }
}
