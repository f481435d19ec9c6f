use async_trait::async_trait;

use crate::application::repos::{AnalyticsRepo, AnalyticsTarget, RepoError, ViewOutcome};
use crate::domain::analytics::{AnalyticsRecord, click_through_rate_sql};
use crate::domain::types::EntityKind;

use super::{PostgresRepositories, map_sqlx_error};

const RETURNING: &str = "RETURNING impressions, views, clicks, click_through_rate, avg_time_on_page";

#[derive(sqlx::FromRow)]
struct AnalyticsRow {
    impressions: i64,
    views: i64,
    clicks: i64,
    click_through_rate: f64,
    avg_time_on_page: f64,
}

impl From<AnalyticsRow> for AnalyticsRecord {
    fn from(row: AnalyticsRow) -> Self {
        Self {
            impressions: row.impressions,
            views: row.views,
            clicks: row.clicks,
            click_through_rate: row.click_through_rate,
            avg_time_on_page: row.avg_time_on_page,
        }
    }
}

/// Table names for one entity kind.
struct Tables {
    entity: &'static str,
    aggregate: &'static str,
    views: &'static str,
    key: &'static str,
}

fn tables(kind: EntityKind) -> Tables {
    match kind {
        EntityKind::Post => Tables {
            entity: "posts",
            aggregate: "post_analytics",
            views: "post_views",
            key: "post_id",
        },
        EntityKind::Category => Tables {
            entity: "categories",
            aggregate: "category_analytics",
            views: "category_views",
            key: "category_id",
        },
    }
}

#[derive(Debug, Clone, Copy)]
enum Counter {
    Impressions,
    Clicks,
}

impl Counter {
    fn column(self) -> &'static str {
        match self {
            Counter::Impressions => "impressions",
            Counter::Clicks => "clicks",
        }
    }
}

/// `INSERT ... ON CONFLICT DO UPDATE` for one counter column. A fresh row can
/// only hold impressions or clicks, never both, so its rate starts at zero.
fn counter_upsert_sql(kind: EntityKind, counter: Counter) -> String {
    let Tables { aggregate, key, .. } = tables(kind);
    let column = counter.column();
    let (impressions, clicks) = match counter {
        Counter::Impressions => (
            format!("{aggregate}.impressions + EXCLUDED.impressions"),
            format!("{aggregate}.clicks"),
        ),
        Counter::Clicks => (
            format!("{aggregate}.impressions"),
            format!("{aggregate}.clicks + EXCLUDED.clicks"),
        ),
    };
    let rate = click_through_rate_sql(&impressions, &clicks);
    format!(
        "INSERT INTO {aggregate} ({key}, {column}) VALUES ($1, $2) \
         ON CONFLICT ({key}) DO UPDATE SET \
             {column} = {aggregate}.{column} + EXCLUDED.{column}, \
             click_through_rate = {rate}, \
             updated_at = now() \
         {RETURNING}"
    )
}

impl PostgresRepositories {
    async fn upsert_counter(
        &self,
        target: AnalyticsTarget,
        counter: Counter,
        delta: i64,
    ) -> Result<AnalyticsRecord, RepoError> {
        let sql = counter_upsert_sql(target.kind, counter);
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(target.id)
            .bind(delta)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}

#[async_trait]
impl AnalyticsRepo for PostgresRepositories {
    async fn entity_exists(&self, target: AnalyticsTarget) -> Result<bool, RepoError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            tables(target.kind).entity
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(target.id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn add_impressions(
        &self,
        target: AnalyticsTarget,
        delta: i64,
    ) -> Result<AnalyticsRecord, RepoError> {
        if delta < 0 {
            return Err(RepoError::InvalidInput {
                message: format!("impression delta must be non-negative, got {delta}"),
            });
        }
        self.upsert_counter(target, Counter::Impressions, delta).await
    }

    async fn increment_clicks(
        &self,
        target: AnalyticsTarget,
    ) -> Result<AnalyticsRecord, RepoError> {
        self.upsert_counter(target, Counter::Clicks, 1).await
    }

    async fn record_view(
        &self,
        target: AnalyticsTarget,
        address: &str,
    ) -> Result<ViewOutcome, RepoError> {
        let Tables {
            aggregate,
            views,
            key,
            ..
        } = tables(target.kind);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(&format!(
            "INSERT INTO {aggregate} ({key}) VALUES ($1) ON CONFLICT ({key}) DO NOTHING"
        ))
        .bind(target.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO {views} ({key}, ip_address) VALUES ($1, $2) \
             ON CONFLICT ({key}, ip_address) DO NOTHING"
        ))
        .bind(target.id)
        .bind(address)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        let sql = if inserted == 1 {
            format!(
                "UPDATE {aggregate} SET views = views + 1, updated_at = now() \
                 WHERE {key} = $1 {RETURNING}"
            )
        } else {
            format!(
                "SELECT impressions, views, clicks, click_through_rate, avg_time_on_page \
                 FROM {aggregate} WHERE {key} = $1"
            )
        };
        let record: AnalyticsRecord = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(target.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .into();

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(if inserted == 1 {
            ViewOutcome::Counted(record)
        } else {
            ViewOutcome::Duplicate(record)
        })
    }

    async fn set_avg_time_on_page(
        &self,
        target: AnalyticsTarget,
        seconds: f64,
    ) -> Result<AnalyticsRecord, RepoError> {
        let Tables { aggregate, key, .. } = tables(target.kind);
        let sql = format!(
            "INSERT INTO {aggregate} ({key}, avg_time_on_page) VALUES ($1, $2) \
             ON CONFLICT ({key}) DO UPDATE SET \
                 avg_time_on_page = EXCLUDED.avg_time_on_page, \
                 updated_at = now() \
             {RETURNING}"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(target.id)
            .bind(seconds)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_analytics(
        &self,
        target: AnalyticsTarget,
    ) -> Result<Option<AnalyticsRecord>, RepoError> {
        let Tables { aggregate, key, .. } = tables(target.kind);
        let sql = format!(
            "SELECT impressions, views, clicks, click_through_rate, avg_time_on_page \
             FROM {aggregate} WHERE {key} = $1"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(target.id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(AnalyticsRecord::from))
    }
}
