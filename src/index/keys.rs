//! Index key layout.
//!
//! Everything the index writes lives under the `idx:` prefix so a full
//! rebuild can find and clear it with one scan.

use uuid::Uuid;

use crate::domain::SortOrder;

/// Set of every indexed document id.
pub const ALL_DOCS: &str = "idx:docs:all";

/// Scan pattern covering every index key.
pub const PATTERN: &str = "idx:*";

/// Key holding a document snapshot (serialized [`Document`]).
///
/// [`Document`]: crate::domain::Document
pub fn doc_key(id: Uuid) -> String {
    format!("idx:doc:{id}")
}

/// Posting set for one token: ids of documents containing it.
pub fn word_key(token: &str) -> String {
    format!("idx:word:{token}")
}

/// Global date ordering (sorted set scored by publish time).
pub const ORDER_DATE: &str = "idx:order:date";
/// Global view-count ordering.
pub const ORDER_VIEWS: &str = "idx:order:views";
/// Global net-vote ordering.
pub const ORDER_VOTES: &str = "idx:order:votes";

/// Global ordering for a sort.
///
/// Relevance has no index-side ordering; callers fall back to date.
pub fn order_key(sort: SortOrder) -> Option<&'static str> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::Date => Some(ORDER_DATE),
        SortOrder::Views => Some(ORDER_VIEWS),
        SortOrder::Votes => Some(ORDER_VOTES),
    }
}

/// Set of document ids in one category.
pub fn category_key(category_id: Uuid) -> String {
    format!("idx:category:{category_id}")
}

/// Per-category date ordering (sorted set scored by publish time).
pub fn category_date_key(category_id: Uuid) -> String {
    format!("idx:category:{category_id}:date")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        let id = Uuid::nil();
        assert_eq!(doc_key(id), format!("idx:doc:{id}"));
        assert_eq!(word_key("trade"), "idx:word:trade");
        assert_eq!(category_key(id), format!("idx:category:{id}"));
        assert_eq!(category_date_key(id), format!("idx:category:{id}:date"));
    }

    #[test]
    fn order_keys_per_sort() {
        assert_eq!(order_key(SortOrder::Relevance), None);
        assert_eq!(order_key(SortOrder::Date), Some("idx:order:date"));
        assert_eq!(order_key(SortOrder::Views), Some("idx:order:views"));
        assert_eq!(order_key(SortOrder::Votes), Some("idx:order:votes"));
    }
}
