//! Click, view and time-on-page operations on analytics aggregates.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::jobs::enqueue_record_view_job;
use crate::application::repos::{
    AnalyticsRepo, AnalyticsTarget, CategoriesRepo, JobsRepo, PostsRepo, RepoError,
};
use crate::domain::analytics::AnalyticsRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{EntityKind, PostStatus};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AnalyticsService {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    analytics: Arc<dyn AnalyticsRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl AnalyticsService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        analytics: Arc<dyn AnalyticsRepo>,
        jobs: Arc<dyn JobsRepo>,
    ) -> Self {
        Self {
            posts,
            categories,
            analytics,
            jobs,
        }
    }

    /// Count a click directly against the aggregate and return the new total.
    /// Clicks are not de-duplicated, so they are never routed through the queue.
    pub async fn increment_click(&self, kind: EntityKind, slug: &str) -> Result<i64, AnalyticsError> {
        let target = self.resolve(kind, slug).await?;
        let record = self
            .analytics
            .increment_clicks(target)
            .await
            .map_err(|err| vanished(err, kind, slug))?;
        Ok(record.clicks)
    }

    pub async fn record_time_on_page(
        &self,
        kind: EntityKind,
        slug: &str,
        seconds: f64,
    ) -> Result<AnalyticsRecord, AnalyticsError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(DomainError::validation("seconds", "must be a non-negative number").into());
        }
        let target = self.resolve(kind, slug).await?;
        self.analytics
            .set_avg_time_on_page(target, seconds)
            .await
            .map_err(|err| vanished(err, kind, slug))
    }

    /// Current aggregate; entities without one report zeroes.
    pub async fn analytics_for(
        &self,
        kind: EntityKind,
        slug: &str,
    ) -> Result<AnalyticsRecord, AnalyticsError> {
        let target = self.resolve(kind, slug).await?;
        Ok(self
            .analytics
            .find_analytics(target)
            .await?
            .unwrap_or_default())
    }

    /// Queue a de-duplicated view without waiting for the enqueue to finish.
    pub fn schedule_view(&self, target: AnalyticsTarget, address: String) {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            if let Err(err) = enqueue_record_view_job(jobs.as_ref(), target, address).await {
                warn!(
                    target = "application::analytics::schedule_view",
                    kind = target.kind.as_str(),
                    id = %target.id,
                    error = %err,
                    "failed to enqueue view"
                );
            }
        });
    }

    async fn resolve(&self, kind: EntityKind, slug: &str) -> Result<AnalyticsTarget, AnalyticsError> {
        let slug = slug.trim();
        let id: Option<Uuid> = match kind {
            EntityKind::Post => self
                .posts
                .find_by_slug(slug, PostStatus::Published)
                .await?
                .map(|post| post.id),
            EntityKind::Category => self
                .categories
                .find_by_slug(slug)
                .await?
                .map(|category| category.id),
        };
        id.map(|id| AnalyticsTarget::new(kind, id))
            .ok_or_else(|| DomainError::not_found(kind.as_str(), slug).into())
    }
}

// The entity resolved a moment ago but the write was rejected as referencing a
// missing row, so it was deleted in between.
fn vanished(err: RepoError, kind: EntityKind, slug: &str) -> AnalyticsError {
    match err {
        RepoError::InvalidInput { .. } => DomainError::not_found(kind.as_str(), slug.trim()).into(),
        other => other.into(),
    }
}
