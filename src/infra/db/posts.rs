use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{PostListFilter, PostsRepo, RepoError};
use crate::domain::entities::{CategoryRecord, HeadingRecord, PostListRecord, PostRecord};
use crate::domain::types::PostStatus;

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str = "p.id, p.category_id, p.title, p.description, p.content, \
    p.keywords, p.thumbnail, p.slug, p.status, p.created_at, p.updated_at";

const SEARCH_COLUMNS: [&str; 4] = ["p.title", "p.description", "p.content", "p.keywords"];

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    category_id: Option<Uuid>,
    title: String,
    description: String,
    content: String,
    keywords: String,
    thumbnail: Option<String>,
    slug: String,
    status: PostStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            description: row.description,
            content: row.content,
            keywords: row.keywords,
            thumbnail: row.thumbnail,
            slug: row.slug,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A post row with its category flattened in through a LEFT JOIN.
#[derive(sqlx::FromRow)]
struct PostListRow {
    #[sqlx(flatten)]
    post: PostRow,
    cat_id: Option<Uuid>,
    cat_parent_id: Option<Uuid>,
    cat_name: Option<String>,
    cat_title: Option<String>,
    cat_description: Option<String>,
    cat_thumbnail: Option<String>,
    cat_slug: Option<String>,
    cat_created_at: Option<OffsetDateTime>,
    cat_updated_at: Option<OffsetDateTime>,
    views: i64,
}

impl From<PostListRow> for PostListRecord {
    fn from(row: PostListRow) -> Self {
        let category = match (
            row.cat_id,
            row.cat_name,
            row.cat_slug,
            row.cat_created_at,
            row.cat_updated_at,
        ) {
            (Some(id), Some(name), Some(slug), Some(created_at), Some(updated_at)) => {
                Some(CategoryRecord {
                    id,
                    parent_id: row.cat_parent_id,
                    name,
                    title: row.cat_title,
                    description: row.cat_description,
                    thumbnail: row.cat_thumbnail,
                    slug,
                    created_at,
                    updated_at,
                })
            }
            _ => None,
        };

        Self {
            post: PostRecord::from(row.post),
            category,
            views: row.views,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HeadingRow {
    id: Uuid,
    post_id: Uuid,
    title: String,
    slug: String,
    level: i16,
    sort_order: i32,
}

impl From<HeadingRow> for HeadingRecord {
    fn from(row: HeadingRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            title: row.title,
            slug: row.slug,
            level: row.level,
            sort_order: row.sort_order,
        }
    }
}

impl PostgresRepositories {
    fn apply_post_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostListFilter) {
        qb.push(" AND p.status = ");
        qb.push_bind(filter.status);

        if let Some(ids) = filter.category_ids.as_ref() {
            qb.push(" AND p.category_id = ANY(");
            qb.push_bind(ids.as_slice());
            qb.push(")");
        }

        if let Some(search) = filter.search.as_deref() {
            Self::push_search(qb, &SEARCH_COLUMNS, search);
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostListRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(
            ", c.id AS cat_id, c.parent_id AS cat_parent_id, c.name AS cat_name, \
             c.title AS cat_title, c.description AS cat_description, \
             c.thumbnail AS cat_thumbnail, c.slug AS cat_slug, \
             c.created_at AS cat_created_at, c.updated_at AS cat_updated_at, \
             COALESCE(pa.views, 0) AS views \
             FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             LEFT JOIN post_analytics pa ON pa.post_id = p.id \
             WHERE 1=1 ",
        );
        Self::apply_post_filter(&mut qb, filter);
        Self::push_order_by(&mut qb, "p", "title", "pa.views", filter.sort, filter.ordering);

        qb.push(" LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<PostListRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostListRecord::from).collect())
    }

    async fn count_posts(&self, filter: &PostListFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_post_filter(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_slug(
        &self,
        slug: &str,
        status: PostStatus,
    ) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = $1 AND p.status = $2");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .bind(status)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError> {
        let rows = sqlx::query_as::<_, HeadingRow>(
            r#"
            SELECT id, post_id, title, slug, level, sort_order
              FROM headings
             WHERE post_id = $1
             ORDER BY sort_order, id
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HeadingRecord::from).collect())
    }

    async fn view_count(&self, post_id: Uuid) -> Result<i64, RepoError> {
        let views = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE((SELECT views FROM post_analytics WHERE post_id = $1), 0)",
        )
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(views)
    }
}
