//! The tiered search service.
//!
//! Resolves each query through cache, then the inverted index, then a
//! ranked relational query. Every successfully answered query writes its
//! response through to cache, so a transient index outage self-heals for
//! repeat queries within the TTL window; failed or invalid queries yield
//! empty results and cache nothing.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::repos::{ContentRepo, RankedPost, RepoError};
use crate::cache::{DomainCache, keys};
use crate::domain::{Document, SortOrder};
use crate::index::IndexEngine;

use super::config::SearchConfig;

const METRIC_SEARCH_REQUESTS: &str = "rivista_search_requests_total";
const METRIC_SEARCH_SUGGESTIONS: &str = "rivista_search_suggestions_total";

/// Queries surfaced by the static popular-searches endpoint.
const POPULAR_SEARCHES: [&str; 8] = [
    "politics",
    "economy",
    "technology",
    "climate",
    "elections",
    "health",
    "culture",
    "science",
];

/// Which tier produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Cache,
    Index,
    Database,
}

/// One result row, shaped for the response and for caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostHit {
    pub id: Uuid,
    pub title: String,
    pub category_id: Option<Uuid>,
    pub author_names: Vec<String>,
    pub views: i64,
    pub net_votes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Document> for PostHit {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            category_id: doc.category_id,
            author_names: doc.author_names,
            views: doc.views,
            net_votes: doc.net_votes,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub posts: Vec<PostHit>,
    pub total: u64,
    pub source: SearchSource,
}

impl SearchResponse {
    fn empty(source: SearchSource) -> Self {
        Self {
            posts: Vec::new(),
            total: 0,
            source,
        }
    }
}

/// Outcome of a full rebuild; reported structurally, never as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReindexOutcome {
    pub success: bool,
    pub message: String,
    pub indexed: u64,
    pub failed: u64,
}

/// Tiered search orchestrator.
pub struct SearchService {
    cache: DomainCache,
    index: Arc<IndexEngine>,
    content: Arc<dyn ContentRepo>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        cache: DomainCache,
        index: Arc<IndexEngine>,
        content: Arc<dyn ContentRepo>,
        config: SearchConfig,
    ) -> Self {
        Self {
            cache,
            index,
            content,
            config,
        }
    }

    /// Resolve a search query through the tiers.
    ///
    /// Never fails: invalid input (blank or oversized query) yields an
    /// empty response before any store call, and any tier failure degrades
    /// to the next tier, worst case an empty response. Nothing is cached
    /// unless a tier answered successfully.
    #[instrument(skip(self))]
    pub async fn search_posts(
        &self,
        query: &str,
        category_id: Option<Uuid>,
        sort: SortOrder,
        limit: u32,
    ) -> SearchResponse {
        if query.chars().count() > self.config.max_query_len {
            debug!(len = query.chars().count(), "search query too long; empty response");
            return SearchResponse::empty(SearchSource::Database);
        }
        let normalized = keys::normalize_query(query);
        if normalized.is_empty() {
            debug!("blank search query; empty response");
            return SearchResponse::empty(SearchSource::Database);
        }
        let limit = self.config.clamp_limit(limit);

        if let Some(mut cached) = self
            .cache
            .get_search_results::<SearchResponse>(&normalized, category_id, sort)
            .await
        {
            cached.source = SearchSource::Cache;
            counter!(METRIC_SEARCH_REQUESTS, "tier" => "cache").increment(1);
            return cached;
        }

        match self
            .index
            .query(&normalized, category_id, sort, limit, 0)
            .await
        {
            Ok(page) if !page.documents.is_empty() => {
                let response = SearchResponse {
                    posts: page.documents.into_iter().map(PostHit::from).collect(),
                    total: page.total,
                    source: SearchSource::Index,
                };
                self.cache
                    .cache_search_results(&normalized, category_id, sort, &response)
                    .await;
                counter!(METRIC_SEARCH_REQUESTS, "tier" => "index").increment(1);
                return response;
            }
            Ok(_) => debug!(query = %normalized, "index returned no candidates; falling back"),
            Err(err) => warn!(query = %normalized, %err, "index query failed; falling back"),
        }

        match self
            .relational_fallback(&normalized, category_id, sort, limit)
            .await
        {
            Ok(response) => {
                self.cache
                    .cache_search_results(&normalized, category_id, sort, &response)
                    .await;
                counter!(METRIC_SEARCH_REQUESTS, "tier" => "database").increment(1);
                response
            }
            // Last tier down: empty response, and nothing cached so the
            // next identical query retries the full tier walk.
            Err(err) => {
                warn!(query = %normalized, %err, "relational fallback failed; empty response");
                SearchResponse::empty(SearchSource::Database)
            }
        }
    }

    /// Ranked relational search plus one batch author fetch.
    async fn relational_fallback(
        &self,
        normalized: &str,
        category_id: Option<Uuid>,
        sort: SortOrder,
        limit: u32,
    ) -> Result<SearchResponse, RepoError> {
        let ranked = self
            .content
            .search_ranked(normalized, category_id, sort, limit)
            .await?;

        if ranked.is_empty() {
            return Ok(SearchResponse {
                posts: Vec::new(),
                total: 0,
                source: SearchSource::Database,
            });
        }

        let ids: Vec<Uuid> = ranked.iter().map(|row| row.id).collect();
        let mut authors = self.content.authors_for_posts(&ids).await?;

        let posts: Vec<PostHit> = ranked
            .into_iter()
            .map(|row: RankedPost| PostHit {
                author_names: authors.remove(&row.id).unwrap_or_default(),
                id: row.id,
                title: row.title,
                category_id: row.category_id,
                views: row.views,
                net_votes: row.net_votes,
                created_at: row.created_at,
            })
            .collect();

        Ok(SearchResponse {
            total: posts.len() as u64,
            posts,
            source: SearchSource::Database,
        })
    }

    /// Title-prefix suggestions: cache, then the relational store. No index
    /// tier; prefixes do not map onto whole-token postings.
    ///
    /// Never fails: invalid or too-short input and relational errors all
    /// yield an empty list.
    #[instrument(skip(self))]
    pub async fn search_suggestions(&self, query: &str, limit: u32) -> Vec<String> {
        if query.chars().count() > self.config.max_query_len {
            debug!(len = query.chars().count(), "suggestion query too long; empty response");
            return Vec::new();
        }
        let normalized = keys::normalize_query(query);
        if normalized.chars().count() < self.config.min_suggestion_len {
            return Vec::new();
        }
        let limit = self.config.clamp_limit(limit);

        if let Some(cached) = self
            .cache
            .get_suggestions::<Vec<String>>(&normalized, limit)
            .await
        {
            counter!(METRIC_SEARCH_SUGGESTIONS, "tier" => "cache").increment(1);
            return cached;
        }

        match self.content.title_suggestions(&normalized, limit).await {
            Ok(suggestions) => {
                self.cache
                    .cache_suggestions(&normalized, limit, &suggestions)
                    .await;
                counter!(METRIC_SEARCH_SUGGESTIONS, "tier" => "database").increment(1);
                suggestions
            }
            Err(err) => {
                warn!(query = %normalized, %err, "suggestion lookup failed; empty response");
                Vec::new()
            }
        }
    }

    /// Static popular searches; no store access.
    pub fn popular_searches(&self) -> Vec<String> {
        POPULAR_SEARCHES.iter().map(|s| s.to_string()).collect()
    }

    /// Rebuild the whole index, then drop every cached search response.
    ///
    /// Failures are folded into the outcome instead of raised, since the
    /// caller is an operator endpoint that always wants the count report.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> ReindexOutcome {
        match self.index.reindex_all().await {
            Ok(stats) => {
                self.cache
                    .inner()
                    .invalidate_by_namespace(keys::NS_SEARCH)
                    .await;
                info!(
                    indexed = stats.indexed,
                    failed = stats.failed,
                    "reindex finished; search cache cleared"
                );
                ReindexOutcome {
                    success: stats.failed == 0,
                    message: format!(
                        "reindexed {} documents ({} failed)",
                        stats.indexed, stats.failed
                    ),
                    indexed: stats.indexed,
                    failed: stats.failed,
                }
            }
            Err(err) => {
                warn!(%err, "reindex aborted");
                ReindexOutcome {
                    success: false,
                    message: format!("reindex aborted: {err}"),
                    indexed: 0,
                    failed: 0,
                }
            }
        }
    }
}
