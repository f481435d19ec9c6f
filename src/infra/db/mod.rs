//! Postgres-backed repository implementations.

mod analytics;
mod categories;
mod jobs;
mod posts;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::RepoError;
use crate::domain::types::{NameOrdering, SortKey};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// `AND (<col> ILIKE $n OR ...)` over the given columns.
    fn push_search<'q>(qb: &mut QueryBuilder<'q, Postgres>, columns: &[&str], search: &str) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (");
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            qb.push(*column);
            qb.push(" ILIKE ");
            qb.push_bind(pattern.clone());
        }
        qb.push(")");
    }

    /// Sort key first, then name ordering, then `id` so pages never overlap.
    fn push_order_by(
        qb: &mut QueryBuilder<'_, Postgres>,
        alias: &str,
        name_column: &str,
        views_column: &str,
        sort: Option<SortKey>,
        ordering: Option<NameOrdering>,
    ) {
        let mut terms = Vec::with_capacity(3);
        match sort {
            Some(SortKey::Newest) => terms.push(format!("{alias}.created_at DESC")),
            Some(SortKey::RecentlyUpdated) => terms.push(format!("{alias}.updated_at DESC")),
            Some(SortKey::MostViewed) => terms.push(format!("COALESCE({views_column}, 0) DESC")),
            None => {}
        }
        match ordering {
            Some(NameOrdering::Az) => terms.push(format!("{alias}.{name_column} ASC")),
            Some(NameOrdering::Za) => terms.push(format!("{alias}.{name_column} DESC")),
            None => {}
        }
        if sort.is_none() && ordering.is_none() {
            terms.push(format!("{alias}.created_at DESC"));
        }
        terms.push(format!("{alias}.id ASC"));

        qb.push(" ORDER BY ");
        qb.push(terms.join(", "));
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
