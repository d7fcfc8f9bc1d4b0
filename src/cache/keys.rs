//! Cache key composition and the fixed namespace/tag conventions.
//!
//! Writers and readers must agree on these formats byte-for-byte; every
//! function here is the single source of truth for its format.

use uuid::Uuid;

use crate::domain::SortOrder;

// Namespaces
pub const NS_APP: &str = "app";
pub const NS_POSTS: &str = "posts";
pub const NS_SEARCH: &str = "search";
pub const NS_CATEGORIES: &str = "categories";
pub const NS_USERS: &str = "users";
pub const NS_ANALYTICS: &str = "analytics";

// Tags
pub const TAG_POSTS: &str = "posts";
pub const TAG_SEARCH: &str = "search";
pub const TAG_CONTENT: &str = "content";
pub const TAG_CATEGORIES: &str = "categories";
pub const TAG_USERS: &str = "users";
pub const TAG_ANALYTICS: &str = "analytics";

/// Tag grouping every cache entry derived from one category's posts.
pub fn category_tag(category_id: Uuid) -> String {
    format!("category:{category_id}")
}

/// Store key holding a value entry.
pub fn composed_key(namespace: &str, key: &str) -> String {
    format!("cache:{namespace}:{key}")
}

/// Store key holding the metadata twin of a value entry.
pub fn meta_key(namespace: &str, key: &str) -> String {
    format!("cache:{namespace}:{key}:meta")
}

/// Store key holding a tag's membership set.
pub fn tag_key(tag: &str) -> String {
    format!("cache-tag:{tag}")
}

/// Scan pattern covering every entry (values and metadata) in a namespace.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("cache:{namespace}:*")
}

/// Lowercase, trim, and collapse internal whitespace so equivalent queries
/// share one cache entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn category_segment(category_id: Option<Uuid>) -> String {
    category_id.map_or_else(|| "all".to_string(), |id| id.to_string())
}

/// `search:<query>:<categoryId|"all">:<sortBy>`
pub fn search_key(normalized_query: &str, category_id: Option<Uuid>, sort: SortOrder) -> String {
    format!(
        "search:{normalized_query}:{}:{}",
        category_segment(category_id),
        sort.as_str()
    )
}

/// `feed:<categoryId|"all">:<limit>`
pub fn feed_key(category_id: Option<Uuid>, limit: u32) -> String {
    format!("feed:{}:{limit}", category_segment(category_id))
}

/// `suggestions:<query>:<limit>`
pub fn suggestions_key(normalized_query: &str, limit: u32) -> String {
    format!("suggestions:{normalized_query}:{limit}")
}

/// `user_posts:<userId>:<status|"all">`
pub fn user_posts_key(user_id: Uuid, status: Option<&str>) -> String {
    format!("user_posts:{user_id}:{}", status.unwrap_or("all"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_and_meta_keys_share_a_prefix() {
        assert_eq!(composed_key("posts", "42"), "cache:posts:42");
        assert_eq!(meta_key("posts", "42"), "cache:posts:42:meta");
        assert!(meta_key("posts", "42").starts_with(&composed_key("posts", "42")));
    }

    #[test]
    fn query_normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Trade   POLICY "), "trade policy");
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn search_key_format() {
        let cat = Uuid::nil();
        assert_eq!(
            search_key("trade policy", Some(cat), SortOrder::Views),
            format!("search:trade policy:{cat}:views")
        );
        assert_eq!(
            search_key("trade policy", None, SortOrder::Relevance),
            "search:trade policy:all:relevance"
        );
    }

    #[test]
    fn feed_suggestions_and_user_posts_formats() {
        assert_eq!(feed_key(None, 20), "feed:all:20");
        assert_eq!(suggestions_key("braz", 5), "suggestions:braz:5");

        let user = Uuid::nil();
        assert_eq!(
            user_posts_key(user, Some("published")),
            format!("user_posts:{user}:published")
        );
        assert_eq!(user_posts_key(user, None), format!("user_posts:{user}:all"));
    }

    #[test]
    fn same_query_same_key() {
        let a = search_key(&normalize_query("Brazil  Trade"), None, SortOrder::Date);
        let b = search_key(&normalize_query("brazil trade"), None, SortOrder::Date);
        assert_eq!(a, b);
    }
}
