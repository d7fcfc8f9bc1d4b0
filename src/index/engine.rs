//! Index engine: writes, removals, rebuilds, and keyword queries.

use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::repos::{ContentRepo, IndexablePost, RepoError};
use crate::domain::{Document, SortOrder};
use crate::kv::{KvError, KvStore};

use super::config::IndexConfig;
use super::keys;
use super::tokenize::tokenize;

const METRIC_INDEX_DOCUMENTS: &str = "rivista_index_documents_total";
const METRIC_INDEX_PARTIAL_WRITES: &str = "rivista_index_partial_write_total";

const DELETE_CHUNK: usize = 200;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] KvError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// One page of index query results.
///
/// `total` counts candidates after intersection and before stale-posting
/// filtering, so it can slightly overcount while postings lag removals.
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub documents: Vec<Document>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexStats {
    pub indexed: u64,
    pub failed: u64,
}

/// Inverted index over the key-value store.
pub struct IndexEngine {
    kv: Arc<dyn KvStore>,
    content: Arc<dyn ContentRepo>,
    config: IndexConfig,
}

impl IndexEngine {
    pub fn new(kv: Arc<dyn KvStore>, content: Arc<dyn ContentRepo>, config: IndexConfig) -> Self {
        Self {
            kv,
            content,
            config,
        }
    }

    /// Index one record from the relational source of truth.
    ///
    /// Returns `Ok(false)` when the record is missing or ineligible. The
    /// snapshot write is load-bearing and fails the call; posting and
    /// ordering writes fan out concurrently and individual failures only
    /// log, since a stale or missing posting degrades recall, not
    /// correctness.
    #[instrument(skip(self))]
    pub async fn index_document(&self, id: Uuid) -> Result<bool, IndexError> {
        let Some(post) = self.content.fetch_indexable(id).await? else {
            debug!(%id, "record missing or ineligible; not indexed");
            return Ok(false);
        };

        let doc = snapshot_from(post);
        let json = serde_json::to_string(&doc)
            .map_err(|err| KvError::codec(keys::doc_key(id), err))?;
        self.kv
            .set_ex(&keys::doc_key(id), &json, self.config.snapshot_ttl())
            .await?;

        let member = id.to_string();
        let date_score = doc.created_at.unix_timestamp() as f64;
        let mut tokens = tokenize(&doc.search_text);
        tokens.truncate(self.config.max_tokens_per_doc);
        let token_count = tokens.len();

        let mut writes: Vec<BoxFuture<'_, Result<(), KvError>>> = Vec::new();
        for token in tokens {
            let kv = Arc::clone(&self.kv);
            let member = member.clone();
            writes.push(Box::pin(async move {
                kv.sadd(&keys::word_key(&token), &[member]).await
            }));
        }
        {
            let kv = Arc::clone(&self.kv);
            let member = member.clone();
            writes.push(Box::pin(async move {
                kv.sadd(keys::ALL_DOCS, &[member]).await
            }));
        }
        for (key, score) in [
            (keys::ORDER_DATE, date_score),
            (keys::ORDER_VIEWS, doc.views as f64),
            (keys::ORDER_VOTES, doc.net_votes as f64),
        ] {
            let kv = Arc::clone(&self.kv);
            let member = member.clone();
            writes.push(Box::pin(
                async move { kv.zadd(key, &member, score).await },
            ));
        }
        if let Some(category_id) = doc.category_id {
            let kv = Arc::clone(&self.kv);
            let member_set = member.clone();
            writes.push(Box::pin(async move {
                kv.sadd(&keys::category_key(category_id), &[member_set]).await
            }));
            let kv = Arc::clone(&self.kv);
            let member_z = member.clone();
            writes.push(Box::pin(async move {
                kv.zadd(&keys::category_date_key(category_id), &member_z, date_score)
                    .await
            }));
        }

        let failures = join_all(writes)
            .await
            .into_iter()
            .filter(|r| r.is_err())
            .count();
        if failures > 0 {
            warn!(%id, failures, "index writes partially failed; recall degraded until reindex");
            counter!(METRIC_INDEX_PARTIAL_WRITES).increment(failures as u64);
        }

        debug!(%id, token_count, "document indexed");
        counter!(METRIC_INDEX_DOCUMENTS, "op" => "index").increment(1);
        Ok(true)
    }

    /// Drop one document: snapshot, membership, and orderings.
    ///
    /// Word postings are left behind deliberately; queries filter candidates
    /// without a snapshot, and a full rebuild clears the residue.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, id: Uuid) -> Result<(), IndexError> {
        let category_id = match self.kv.get(&keys::doc_key(id)).await? {
            Some(json) => serde_json::from_str::<Document>(&json)
                .ok()
                .and_then(|doc| doc.category_id),
            None => None,
        };

        let member = id.to_string();
        self.kv.del(&[keys::doc_key(id)]).await?;
        self.kv.srem(keys::ALL_DOCS, &member).await?;
        for order in [keys::ORDER_DATE, keys::ORDER_VIEWS, keys::ORDER_VOTES] {
            self.kv.zrem(order, &member).await?;
        }
        if let Some(category_id) = category_id {
            self.kv.srem(&keys::category_key(category_id), &member).await?;
            self.kv
                .zrem(&keys::category_date_key(category_id), &member)
                .await?;
        }

        debug!(%id, "document removed from index");
        counter!(METRIC_INDEX_DOCUMENTS, "op" => "remove").increment(1);
        Ok(())
    }

    /// Clear the whole index keyspace and rebuild it from scratch.
    ///
    /// The one operation with structured failure reporting: per-document
    /// errors are counted and logged, not fatal; only losing the store or
    /// the id enumeration aborts the rebuild.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> Result<ReindexStats, IndexError> {
        let existing = self.kv.scan(keys::PATTERN).await?;
        for chunk in existing.chunks(DELETE_CHUNK) {
            self.kv.del(chunk).await?;
        }
        info!(cleared = existing.len(), "index keyspace cleared for rebuild");

        let ids = self.content.list_indexable_ids().await?;
        let mut stats = ReindexStats {
            indexed: 0,
            failed: 0,
        };
        for id in ids {
            match self.index_document(id).await {
                Ok(true) => stats.indexed += 1,
                // Became ineligible between enumeration and fetch.
                Ok(false) => {}
                Err(err) => {
                    warn!(%id, %err, "reindex of document failed");
                    stats.failed += 1;
                }
            }
        }

        info!(
            indexed = stats.indexed,
            failed = stats.failed,
            "full reindex complete"
        );
        Ok(stats)
    }

    /// Keyword query with AND semantics.
    ///
    /// Blank query text matches every document (optionally scoped to a
    /// category). Non-blank text whose tokens are all filtered out (too
    /// short, stopwords) matches nothing. Results are ordered by the
    /// requested sort's absolute score, descending, with the document id as
    /// tiebreak; `Relevance` has no index-side scoring and falls back to
    /// date order.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        text: &str,
        category_id: Option<Uuid>,
        sort: SortOrder,
        limit: u32,
        offset: u32,
    ) -> Result<QueryPage, IndexError> {
        let tokens = tokenize(text);
        let candidates = if tokens.is_empty() {
            if !text.trim().is_empty() {
                // Every keyword was filtered out; that is a query for
                // nothing, not a query for everything.
                debug!(text, "no tokens survived filtering");
                return Ok(QueryPage {
                    documents: Vec::new(),
                    total: 0,
                });
            }
            match category_id {
                Some(category_id) => self.kv.smembers(&keys::category_key(category_id)).await?,
                None => self.kv.smembers(keys::ALL_DOCS).await?,
            }
        } else {
            let mut sets: Vec<String> = tokens.iter().map(|t| keys::word_key(t)).collect();
            if let Some(category_id) = category_id {
                sets.push(keys::category_key(category_id));
            }
            self.kv.sinter(&sets).await?
        };

        let total = candidates.len() as u64;
        if candidates.is_empty() {
            return Ok(QueryPage {
                documents: Vec::new(),
                total: 0,
            });
        }

        let order = keys::order_key(sort).unwrap_or(keys::ORDER_DATE);
        let scores = join_all(
            candidates
                .iter()
                .map(|member| self.kv.zscore(order, member)),
        )
        .await;

        let mut ranked: Vec<(f64, &String)> = Vec::with_capacity(candidates.len());
        for (member, score) in candidates.iter().zip(scores) {
            // Absent from the ordering means the doc is on its way out; sink
            // it to the end rather than guessing a score.
            ranked.push((score?.unwrap_or(f64::MIN), member));
        }
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        let page: Vec<String> = ranked
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|(_, member)| {
                Uuid::parse_str(member)
                    .map(keys::doc_key)
                    .map_err(|err| warn!(member, %err, "non-uuid member in index set"))
                    .ok()
            })
            .collect();

        let mut documents = Vec::with_capacity(page.len());
        for (key, raw) in page.iter().zip(self.kv.mget(&page).await?) {
            match raw {
                Some(json) => match serde_json::from_str::<Document>(&json) {
                    Ok(doc) => documents.push(doc),
                    Err(err) => warn!(key, %err, "undecodable snapshot skipped"),
                },
                // Stale posting: snapshot already gone.
                None => debug!(key, "stale posting filtered from results"),
            }
        }

        Ok(QueryPage { documents, total })
    }
}

/// Build the index snapshot from the joined relational row.
fn snapshot_from(post: IndexablePost) -> Document {
    let mut text_parts = vec![post.title.clone(), post.body];
    if let Some(category_name) = &post.category_name {
        text_parts.push(category_name.clone());
    }
    text_parts.extend(post.author_names.iter().cloned());

    Document {
        id: post.id,
        title: post.title,
        search_text: text_parts.join(" ").to_lowercase(),
        category_id: post.category_id,
        author_names: post.author_names,
        views: post.views,
        comment_count: post.comment_count,
        net_votes: post.up_votes - post.down_votes,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use time::macros::datetime;

    use super::*;
    use crate::kv::MemoryStore;

    struct FakeRepo {
        posts: HashMap<Uuid, IndexablePost>,
    }

    #[async_trait]
    impl ContentRepo for FakeRepo {
        async fn fetch_indexable(&self, id: Uuid) -> Result<Option<IndexablePost>, RepoError> {
            Ok(self.posts.get(&id).cloned())
        }

        async fn list_indexable_ids(&self) -> Result<Vec<Uuid>, RepoError> {
            let mut ids: Vec<Uuid> = self.posts.keys().copied().collect();
            ids.sort();
            Ok(ids)
        }

        async fn search_ranked(
            &self,
            _query: &str,
            _category_id: Option<Uuid>,
            _sort: SortOrder,
            _limit: u32,
        ) -> Result<Vec<crate::application::repos::RankedPost>, RepoError> {
            Ok(Vec::new())
        }

        async fn authors_for_posts(
            &self,
            _ids: &[Uuid],
        ) -> Result<HashMap<Uuid, Vec<String>>, RepoError> {
            Ok(HashMap::new())
        }

        async fn title_suggestions(
            &self,
            _prefix: &str,
            _limit: u32,
        ) -> Result<Vec<String>, RepoError> {
            Ok(Vec::new())
        }
    }

    fn post(
        id: Uuid,
        title: &str,
        body: &str,
        category_id: Option<Uuid>,
        views: i64,
        created_at: OffsetDateTime,
    ) -> IndexablePost {
        IndexablePost {
            id,
            title: title.to_string(),
            body: body.to_string(),
            category_id,
            category_name: category_id.map(|_| "World".to_string()),
            author_names: vec!["Ana Souza".to_string()],
            views,
            comment_count: 0,
            up_votes: 3,
            down_votes: 1,
            created_at,
            updated_at: created_at,
        }
    }

    fn engine_with(posts: Vec<IndexablePost>) -> (IndexEngine, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        let repo = FakeRepo {
            posts: posts.into_iter().map(|p| (p.id, p)).collect(),
        };
        let engine = IndexEngine::new(kv.clone(), Arc::new(repo), IndexConfig::default());
        (engine, kv)
    }

    #[tokio::test]
    async fn index_and_query_by_keyword() {
        let id = Uuid::new_v4();
        let (engine, _) = engine_with(vec![post(
            id,
            "Brazil Trade Policy",
            "New tariffs announced",
            None,
            10,
            datetime!(2024-05-01 00:00 UTC),
        )]);

        assert!(engine.index_document(id).await.unwrap());

        let page = engine
            .query("tariffs", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.documents[0].id, id);
        assert_eq!(page.documents[0].net_votes, 2);

        // Author names are searchable too.
        let by_author = engine
            .query("souza", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(by_author.documents.len(), 1);
    }

    #[tokio::test]
    async fn multi_keyword_query_intersects() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (engine, _) = engine_with(vec![
            post(
                a,
                "Brazil trade",
                "exports",
                None,
                1,
                datetime!(2024-01-01 00:00 UTC),
            ),
            post(
                b,
                "Brazil carnival",
                "festivities",
                None,
                2,
                datetime!(2024-01-02 00:00 UTC),
            ),
        ]);
        engine.index_document(a).await.unwrap();
        engine.index_document(b).await.unwrap();

        let both = engine
            .query("brazil", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(both.total, 2);

        let only_trade = engine
            .query("brazil trade", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(only_trade.total, 1);
        assert_eq!(only_trade.documents[0].id, a);

        let none = engine
            .query("brazil submarine", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(none.total, 0);
        assert!(none.documents.is_empty());
    }

    #[tokio::test]
    async fn views_order_and_category_filter() {
        let cat = Uuid::new_v4();
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (engine, _) = engine_with(vec![
            post(
                d1,
                "Policy brief",
                "trade",
                Some(cat),
                5,
                datetime!(2024-01-01 00:00 UTC),
            ),
            post(
                d2,
                "Policy deep dive",
                "trade",
                Some(cat),
                50,
                datetime!(2024-01-02 00:00 UTC),
            ),
            post(
                other,
                "Policy elsewhere",
                "trade",
                None,
                500,
                datetime!(2024-01-03 00:00 UTC),
            ),
        ]);
        for id in [d1, d2, other] {
            engine.index_document(id).await.unwrap();
        }

        let page = engine
            .query("policy", Some(cat), SortOrder::Views, 10, 0)
            .await
            .unwrap();
        let ids: Vec<Uuid> = page.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![d2, d1]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn empty_query_matches_everything_by_date() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (engine, _) = engine_with(vec![
            post(a, "Older", "x", None, 0, datetime!(2024-01-01 00:00 UTC)),
            post(b, "Newer", "y", None, 0, datetime!(2024-06-01 00:00 UTC)),
        ]);
        engine.index_document(a).await.unwrap();
        engine.index_document(b).await.unwrap();

        let page = engine.query("", None, SortOrder::Date, 10, 0).await.unwrap();
        let ids: Vec<Uuid> = page.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn all_tokens_filtered_matches_nothing() {
        let id = Uuid::new_v4();
        let (engine, _) = engine_with(vec![post(
            id,
            "Trade policy",
            "imports",
            None,
            1,
            datetime!(2024-01-01 00:00 UTC),
        )]);
        engine.index_document(id).await.unwrap();

        // Stopwords and short tokens only: nothing survives filtering, and
        // that must not degrade into a match-all.
        for text in ["the of", "a an it", "is"] {
            let page = engine
                .query(text, None, SortOrder::Date, 10, 0)
                .await
                .unwrap();
            assert_eq!(page.total, 0, "query {text:?} should match nothing");
            assert!(page.documents.is_empty());
        }
    }

    #[tokio::test]
    async fn removal_filters_stale_postings_at_query_time() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (engine, kv) = engine_with(vec![
            post(a, "Shared topic", "x", None, 0, datetime!(2024-01-01 00:00 UTC)),
            post(b, "Shared topic", "y", None, 0, datetime!(2024-01-02 00:00 UTC)),
        ]);
        engine.index_document(a).await.unwrap();
        engine.index_document(b).await.unwrap();

        engine.remove_document(a).await.unwrap();

        // The posting for `a` still exists, its snapshot does not.
        assert!(
            kv.smembers(&keys::word_key("shared"))
                .await
                .unwrap()
                .contains(&a.to_string())
        );
        let page = engine
            .query("shared", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        let ids: Vec<Uuid> = page.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[tokio::test]
    async fn unknown_document_is_not_indexed() {
        let (engine, _) = engine_with(vec![]);
        assert!(!engine.index_document(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn reindex_all_is_idempotent() {
        let a = Uuid::new_v4();
        let (engine, kv) = engine_with(vec![post(
            a,
            "Only doc",
            "content here",
            None,
            0,
            datetime!(2024-01-01 00:00 UTC),
        )]);

        let first = engine.reindex_all().await.unwrap();
        assert_eq!(first, ReindexStats { indexed: 1, failed: 0 });
        let after_first = kv.len();

        let second = engine.reindex_all().await.unwrap();
        assert_eq!(second, ReindexStats { indexed: 1, failed: 0 });
        assert_eq!(kv.len(), after_first);

        let page = engine
            .query("content", None, SortOrder::Date, 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn pagination_slices_the_ordered_candidates() {
        let mut posts = Vec::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = Uuid::new_v4();
            ids.push(id);
            posts.push(post(
                id,
                "Paged doc",
                "paged",
                None,
                i * 10,
                datetime!(2024-01-01 00:00 UTC),
            ));
        }
        let (engine, _) = engine_with(posts);
        for id in &ids {
            engine.index_document(*id).await.unwrap();
        }

        let first = engine
            .query("paged", None, SortOrder::Views, 2, 0)
            .await
            .unwrap();
        let second = engine
            .query("paged", None, SortOrder::Views, 2, 2)
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.documents.len(), 2);
        assert_eq!(second.documents.len(), 2);
        assert!(first.documents[0].views >= first.documents[1].views);
        assert!(first.documents[1].views >= second.documents[0].views);
    }
}
