//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::analytics::AnalyticsRecord;
use crate::domain::entities::{CategoryRecord, HeadingRecord, PostListRecord, PostRecord};
use crate::domain::types::{EntityKind, JobType, NameOrdering, PostStatus, SortKey};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filter for post listings. `category_ids` is already resolved from selectors.
#[derive(Debug, Clone)]
pub struct PostListFilter {
    pub status: PostStatus,
    pub search: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
    pub sort: Option<SortKey>,
    pub ordering: Option<NameOrdering>,
}

impl Default for PostListFilter {
    fn default() -> Self {
        Self {
            status: PostStatus::Published,
            search: None,
            category_ids: None,
            sort: None,
            ordering: None,
        }
    }
}

/// Which level of the category tree to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryLevel {
    #[default]
    Root,
    ChildrenOf(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct CategoryListFilter {
    pub level: CategoryLevel,
    pub search: Option<String>,
    pub sort: Option<SortKey>,
    pub ordering: Option<NameOrdering>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostListRecord>, RepoError>;

    async fn count_posts(&self, filter: &PostListFilter) -> Result<u64, RepoError>;

    async fn find_by_slug(
        &self,
        slug: &str,
        status: PostStatus,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError>;

    /// Durable `views` of the post's aggregate, zero when none exists yet.
    async fn view_count(&self, post_id: Uuid) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn count_categories(&self, filter: &CategoryListFilter) -> Result<u64, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;
}

/// Identifies the aggregate a counter event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalyticsTarget {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl AnalyticsTarget {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn post(id: Uuid) -> Self {
        Self::new(EntityKind::Post, id)
    }

    pub fn category(id: Uuid) -> Self {
        Self::new(EntityKind::Category, id)
    }
}

/// Result of offering a view to the de-duplication gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewOutcome {
    /// First view from this address; `views` was incremented.
    Counted(AnalyticsRecord),
    /// Address already counted; aggregate unchanged.
    Duplicate(AnalyticsRecord),
}

impl ViewOutcome {
    pub fn record(&self) -> &AnalyticsRecord {
        match self {
            ViewOutcome::Counted(record) | ViewOutcome::Duplicate(record) => record,
        }
    }
}

/// Durable analytics aggregates. Every mutation creates the aggregate when absent
/// and recomputes the click-through rate in the same atomic statement.
#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    async fn entity_exists(&self, target: AnalyticsTarget) -> Result<bool, RepoError>;

    async fn add_impressions(
        &self,
        target: AnalyticsTarget,
        delta: i64,
    ) -> Result<AnalyticsRecord, RepoError>;

    async fn increment_clicks(&self, target: AnalyticsTarget)
    -> Result<AnalyticsRecord, RepoError>;

    async fn record_view(
        &self,
        target: AnalyticsTarget,
        address: &str,
    ) -> Result<ViewOutcome, RepoError>;

    async fn set_avg_time_on_page(
        &self,
        target: AnalyticsTarget,
        seconds: f64,
    ) -> Result<AnalyticsRecord, RepoError>;

    async fn find_analytics(
        &self,
        target: AnalyticsTarget,
    ) -> Result<Option<AnalyticsRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
