//! Postgres-backed content repository.
//!
//! The relational store owns eligibility: every query here filters to
//! published, latest-version records, so upper tiers never see drafts or
//! superseded lineage versions.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{
    QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query, query_as,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ContentRepo, IndexablePost, RankedPost, RepoError};
use crate::domain::SortOrder;

const ELIGIBLE: &str = "p.status = 'published' AND p.is_latest";
const SEARCH_VECTOR: &str = "to_tsvector('english', p.title || ' ' || p.body)";

/// Escape `LIKE`/`ILIKE` metacharacters so user input only ever matches
/// literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

#[derive(Clone)]
pub struct PostgresContentRepo {
    pool: PgPool,
}

impl PostgresContentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}

#[derive(sqlx::FromRow)]
struct IndexableRow {
    id: Uuid,
    title: String,
    body: String,
    category_id: Option<Uuid>,
    category_name: Option<String>,
    author_names: Vec<String>,
    views: i64,
    comment_count: i64,
    up_votes: i64,
    down_votes: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<IndexableRow> for IndexablePost {
    fn from(row: IndexableRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            category_id: row.category_id,
            category_name: row.category_name,
            author_names: row.author_names,
            views: row.views,
            comment_count: row.comment_count,
            up_votes: row.up_votes,
            down_votes: row.down_votes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RankedRow {
    id: Uuid,
    title: String,
    category_id: Option<Uuid>,
    views: i64,
    net_votes: i64,
    rank: f32,
    created_at: OffsetDateTime,
}

impl From<RankedRow> for RankedPost {
    fn from(row: RankedRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            category_id: row.category_id,
            views: row.views,
            net_votes: row.net_votes,
            rank: row.rank,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    post_id: Uuid,
    display_name: String,
}

#[async_trait]
impl ContentRepo for PostgresContentRepo {
    async fn fetch_indexable(&self, id: Uuid) -> Result<Option<IndexablePost>, RepoError> {
        let sql = format!(
            "SELECT p.id, p.title, p.body, p.category_id, c.name AS category_name, \
                COALESCE(array_agg(u.display_name ORDER BY u.display_name) \
                    FILTER (WHERE u.display_name IS NOT NULL), '{{}}') AS author_names, \
                COALESCE(an.views, 0)::bigint AS views, \
                (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id)::bigint AS comment_count, \
                (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id AND v.value > 0)::bigint AS up_votes, \
                (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id AND v.value < 0)::bigint AS down_votes, \
                p.created_at, p.updated_at \
            FROM posts p \
            LEFT JOIN categories c ON c.id = p.category_id \
            LEFT JOIN post_analytics an ON an.post_id = p.id \
            LEFT JOIN post_authors pa ON pa.post_id = p.id \
            LEFT JOIN users u ON u.id = pa.user_id \
            WHERE p.id = $1 AND {ELIGIBLE} \
            GROUP BY p.id, p.title, p.body, p.category_id, c.name, an.views, \
                p.created_at, p.updated_at"
        );

        let row = query_as::<_, IndexableRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_indexable_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        let sql = format!("SELECT p.id FROM posts p WHERE {ELIGIBLE} ORDER BY p.created_at");
        let rows: Vec<(Uuid,)> = query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn search_ranked(
        &self,
        search: &str,
        category_id: Option<Uuid>,
        sort: SortOrder,
        limit: u32,
    ) -> Result<Vec<RankedPost>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.title, p.category_id, \
                COALESCE(an.views, 0)::bigint AS views, \
                COALESCE((SELECT SUM(CASE WHEN v.value > 0 THEN 1 ELSE -1 END) \
                    FROM post_votes v WHERE v.post_id = p.id), 0)::bigint AS net_votes, \
                ts_rank(",
        );
        qb.push(SEARCH_VECTOR);
        qb.push(", websearch_to_tsquery('english', ");
        qb.push_bind(search);
        qb.push("))::real AS rank, p.created_at \
            FROM posts p \
            LEFT JOIN post_analytics an ON an.post_id = p.id \
            WHERE ");
        qb.push(ELIGIBLE);
        qb.push(" AND ");
        qb.push(SEARCH_VECTOR);
        qb.push(" @@ websearch_to_tsquery('english', ");
        qb.push_bind(search);
        qb.push(")");

        if let Some(category_id) = category_id {
            qb.push(" AND p.category_id = ");
            qb.push_bind(category_id);
        }

        qb.push(match sort {
            SortOrder::Relevance => " ORDER BY rank DESC, p.created_at DESC",
            SortOrder::Date => " ORDER BY p.created_at DESC",
            SortOrder::Views => " ORDER BY views DESC, p.created_at DESC",
            SortOrder::Votes => " ORDER BY net_votes DESC, p.created_at DESC",
        });
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<RankedRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn authors_for_posts(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = query_as::<_, AuthorRow>(
            "SELECT pa.post_id, u.display_name \
            FROM post_authors pa \
            INNER JOIN users u ON u.id = pa.user_id \
            WHERE pa.post_id = ANY($1) \
            ORDER BY pa.post_id, u.display_name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut authors: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in rows {
            authors.entry(row.post_id).or_default().push(row.display_name);
        }
        Ok(authors)
    }

    async fn title_suggestions(&self, prefix: &str, limit: u32) -> Result<Vec<String>, RepoError> {
        let sql = format!(
            "SELECT p.title FROM posts p \
            LEFT JOIN post_analytics an ON an.post_id = p.id \
            WHERE {ELIGIBLE} AND p.title ILIKE $1 \
            ORDER BY COALESCE(an.views, 0) DESC, p.title \
            LIMIT $2"
        );

        let rows: Vec<(String,)> = query_as(&sql)
            .bind(format!("{}%", escape_like(prefix)))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}
