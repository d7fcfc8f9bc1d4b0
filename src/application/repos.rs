//! Relational content store contract consumed by the index and fallback tiers.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::SortOrder;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Joined view of one content record, shaped for the indexer.
///
/// The adapter applies the published + latest-version eligibility filter
/// before returning a row; an ineligible record yields `None` from
/// [`ContentRepo::fetch_indexable`].
#[derive(Debug, Clone)]
pub struct IndexablePost {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub author_names: Vec<String>,
    pub views: i64,
    pub comment_count: i64,
    pub up_votes: i64,
    pub down_votes: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row returned by the relational ranked text search.
#[derive(Debug, Clone)]
pub struct RankedPost {
    pub id: Uuid,
    pub title: String,
    pub category_id: Option<Uuid>,
    pub views: i64,
    pub net_votes: i64,
    /// Text-search rank score; only meaningful for the relevance sort.
    pub rank: f32,
    pub created_at: OffsetDateTime,
}

/// Read-side contract against the relational content store.
///
/// Every method sees only eligible records: published and the latest version
/// of their lineage.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Fetch one record by id with category, authors, analytics, and comment
    /// count joined in. `None` when the record is missing or ineligible.
    async fn fetch_indexable(&self, id: Uuid) -> Result<Option<IndexablePost>, RepoError>;

    /// Enumerate every id currently eligible for indexing.
    async fn list_indexable_ids(&self) -> Result<Vec<Uuid>, RepoError>;

    /// Ranked full-text search; true text rank for `relevance`, otherwise
    /// ordered by the requested sort, limited to one page.
    async fn search_ranked(
        &self,
        query: &str,
        category_id: Option<Uuid>,
        sort: SortOrder,
        limit: u32,
    ) -> Result<Vec<RankedPost>, RepoError>;

    /// Batch author fetch for a page of post ids in a single query.
    async fn authors_for_posts(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>, RepoError>;

    /// Title-prefix suggestions, most viewed first.
    async fn title_suggestions(&self, prefix: &str, limit: u32) -> Result<Vec<String>, RepoError>;
}
