//! Entity-typed cache helpers.
//!
//! Each entity kind gets a fixed namespace, tag set, and TTL here, so call
//! sites never hand-roll cache conventions. Anything more exotic goes
//! through [`SmartCache`] directly.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::keys;
use super::manager::{SetOptions, SmartCache};

/// Domain-aware wrapper over the generic cache.
#[derive(Clone)]
pub struct DomainCache {
    cache: Arc<SmartCache>,
}

impl DomainCache {
    pub fn new(cache: Arc<SmartCache>) -> Self {
        Self { cache }
    }

    pub fn inner(&self) -> &SmartCache {
        &self.cache
    }

    // Posts: tagged with `posts`, `content`, and the post's category so a
    // category-level change can tear them down.

    pub async fn cache_post<T: Serialize>(
        &self,
        post_id: Uuid,
        category_id: Option<Uuid>,
        value: &T,
    ) -> bool {
        let mut tags = vec![keys::TAG_POSTS.to_string(), keys::TAG_CONTENT.to_string()];
        if let Some(category_id) = category_id {
            tags.push(keys::category_tag(category_id));
        }
        let options = SetOptions::namespaced(keys::NS_POSTS)
            .with_ttl(self.cache.config().post_ttl())
            .with_tags(tags);
        self.cache.set(&post_id.to_string(), value, options).await
    }

    pub async fn get_post<T: DeserializeOwned>(&self, post_id: Uuid) -> Option<T> {
        self.cache.get(&post_id.to_string(), keys::NS_POSTS).await
    }

    pub async fn invalidate_post(&self, post_id: Uuid) -> bool {
        self.cache
            .delete(&post_id.to_string(), keys::NS_POSTS)
            .await
    }

    // Search results: short TTL, tagged with both `search` and `posts` so
    // any post mutation clears them.

    pub async fn cache_search_results<T: Serialize>(
        &self,
        normalized_query: &str,
        category_id: Option<Uuid>,
        sort: crate::domain::SortOrder,
        value: &T,
    ) -> bool {
        let key = keys::search_key(normalized_query, category_id, sort);
        let options = SetOptions::namespaced(keys::NS_SEARCH)
            .with_ttl(self.cache.config().search_ttl())
            .with_tags([keys::TAG_SEARCH, keys::TAG_POSTS]);
        self.cache.set(&key, value, options).await
    }

    pub async fn get_search_results<T: DeserializeOwned>(
        &self,
        normalized_query: &str,
        category_id: Option<Uuid>,
        sort: crate::domain::SortOrder,
    ) -> Option<T> {
        let key = keys::search_key(normalized_query, category_id, sort);
        self.cache.get(&key, keys::NS_SEARCH).await
    }

    pub async fn cache_suggestions<T: Serialize>(
        &self,
        normalized_query: &str,
        limit: u32,
        value: &T,
    ) -> bool {
        let key = keys::suggestions_key(normalized_query, limit);
        let options = SetOptions::namespaced(keys::NS_SEARCH)
            .with_ttl(self.cache.config().suggestion_ttl())
            .with_tags([keys::TAG_SEARCH, keys::TAG_POSTS]);
        self.cache.set(&key, value, options).await
    }

    pub async fn get_suggestions<T: DeserializeOwned>(
        &self,
        normalized_query: &str,
        limit: u32,
    ) -> Option<T> {
        let key = keys::suggestions_key(normalized_query, limit);
        self.cache.get(&key, keys::NS_SEARCH).await
    }

    pub async fn cache_feed<T: Serialize>(
        &self,
        category_id: Option<Uuid>,
        limit: u32,
        value: &T,
    ) -> bool {
        let mut tags = vec![keys::TAG_SEARCH.to_string(), keys::TAG_POSTS.to_string()];
        if let Some(category_id) = category_id {
            tags.push(keys::category_tag(category_id));
        }
        let options = SetOptions::namespaced(keys::NS_SEARCH)
            .with_ttl(self.cache.config().search_ttl())
            .with_tags(tags);
        self.cache
            .set(&keys::feed_key(category_id, limit), value, options)
            .await
    }

    pub async fn get_feed<T: DeserializeOwned>(
        &self,
        category_id: Option<Uuid>,
        limit: u32,
    ) -> Option<T> {
        self.cache
            .get(&keys::feed_key(category_id, limit), keys::NS_SEARCH)
            .await
    }

    // The category list changes rarely; one entry under a fixed key.

    pub async fn cache_categories<T: Serialize>(&self, value: &T) -> bool {
        let options = SetOptions::namespaced(keys::NS_CATEGORIES)
            .with_ttl(self.cache.config().category_ttl())
            .with_tags([keys::TAG_CATEGORIES]);
        self.cache.set("all", value, options).await
    }

    pub async fn get_categories<T: DeserializeOwned>(&self) -> Option<T> {
        self.cache.get("all", keys::NS_CATEGORIES).await
    }

    pub async fn cache_user_posts<T: Serialize>(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        value: &T,
    ) -> bool {
        let options = SetOptions::namespaced(keys::NS_USERS)
            .with_ttl(self.cache.config().user_ttl())
            .with_tags([keys::TAG_USERS, keys::TAG_POSTS]);
        self.cache
            .set(&keys::user_posts_key(user_id, status), value, options)
            .await
    }

    pub async fn get_user_posts<T: DeserializeOwned>(
        &self,
        user_id: Uuid,
        status: Option<&str>,
    ) -> Option<T> {
        self.cache
            .get(&keys::user_posts_key(user_id, status), keys::NS_USERS)
            .await
    }

    pub async fn cache_analytics<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let options = SetOptions::namespaced(keys::NS_ANALYTICS)
            .with_ttl(self.cache.config().analytics_ttl())
            .with_tags([keys::TAG_ANALYTICS]);
        self.cache.set(key, value, options).await
    }

    pub async fn get_analytics<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache.get(key, keys::NS_ANALYTICS).await
    }

    // Tag-level teardown, one method per semantic group.

    pub async fn invalidate_posts(&self) -> u64 {
        self.cache.invalidate_by_tag(keys::TAG_POSTS).await
    }

    pub async fn invalidate_search(&self) -> u64 {
        self.cache.invalidate_by_tag(keys::TAG_SEARCH).await
    }

    pub async fn invalidate_content(&self) -> u64 {
        self.cache.invalidate_by_tag(keys::TAG_CONTENT).await
    }

    pub async fn invalidate_categories(&self) -> u64 {
        self.cache.invalidate_by_tag(keys::TAG_CATEGORIES).await
    }

    pub async fn invalidate_users(&self) -> u64 {
        self.cache.invalidate_by_tag(keys::TAG_USERS).await
    }

    pub async fn invalidate_category(&self, category_id: Uuid) -> u64 {
        self.cache
            .invalidate_by_tag(&keys::category_tag(category_id))
            .await
    }
}
