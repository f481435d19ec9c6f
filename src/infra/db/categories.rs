use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{CategoriesRepo, CategoryLevel, CategoryListFilter, RepoError};
use crate::domain::entities::CategoryRecord;

use super::{PostgresRepositories, map_sqlx_error};

const CATEGORY_COLUMNS: &str = "c.id, c.parent_id, c.name, c.title, c.description, \
    c.thumbnail, c.slug, c.created_at, c.updated_at";

const SEARCH_COLUMNS: [&str; 3] = ["c.name", "c.title", "c.description"];

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    parent_id: Option<Uuid>,
    name: String,
    title: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    slug: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            title: row.title,
            description: row.description,
            thumbnail: row.thumbnail,
            slug: row.slug,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_category_filter<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        filter: &'q CategoryListFilter,
    ) {
        match filter.level {
            CategoryLevel::Root => {
                qb.push(" AND c.parent_id IS NULL");
            }
            CategoryLevel::ChildrenOf(parent) => {
                qb.push(" AND c.parent_id = ");
                qb.push_bind(parent);
            }
        }

        if let Some(search) = filter.search.as_deref() {
            Self::push_search(qb, &SEARCH_COLUMNS, search);
        }
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn list_categories(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(CATEGORY_COLUMNS);
        qb.push(
            " FROM categories c \
             LEFT JOIN category_analytics ca ON ca.category_id = c.id \
             WHERE 1=1 ",
        );
        Self::apply_category_filter(&mut qb, filter);
        Self::push_order_by(&mut qb, "c", "name", "ca.views", filter.sort, filter.ordering);

        qb.push(" LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<CategoryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn count_categories(&self, filter: &CategoryListFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM categories c WHERE 1=1 ");
        Self::apply_category_filter(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.slug = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }
}
