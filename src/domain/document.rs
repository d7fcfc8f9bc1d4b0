//! The indexed document snapshot and its sort orders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

/// Snapshot of an eligible content record as of its last index write.
///
/// Exactly one `Document` exists per content id at any time. A document lives
/// in the index iff its source record is published and is the latest version
/// of its lineage; snapshots are overwritten wholesale on every reindex of
/// that id, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    /// Lowercased concatenation of title, body, category name, and author
    /// names; the only text the index tier ever tokenizes.
    pub search_text: String,
    pub category_id: Option<Uuid>,
    pub author_names: Vec<String>,
    pub views: i64,
    pub comment_count: i64,
    /// Up-votes minus down-votes, recomputed from the source of truth on
    /// every index write. Never incremented in-index.
    pub net_votes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Sort orders accepted by both the index tier and the relational fallback.
///
/// `Relevance` is only scored by the relational tier; the index tier carries
/// no scoring model and returns candidates in an implementation-defined order
/// for that sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Relevance,
    Date,
    Views,
    Votes,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
            Self::Views => "views",
            Self::Votes => "votes",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Relevance
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "relevance" => Ok(Self::Relevance),
            "date" => Ok(Self::Date),
            "views" => Ok(Self::Views),
            "votes" => Ok(Self::Votes),
            other => Err(DomainError::UnknownSort {
                value: other.to_string(),
            }),
        }
    }
}
