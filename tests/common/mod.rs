#![allow(dead_code)]

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pressroom::application::analytics::AnalyticsService;
use pressroom::application::categories::CategoryQueryService;
use pressroom::application::listing::Listing;
use pressroom::application::pagination::PageRequest;
use pressroom::application::posts::PostQueryService;
use pressroom::application::repos::{
    AnalyticsRepo, AnalyticsTarget, CategoriesRepo, CategoryLevel, CategoryListFilter, JobsRepo,
    NewJobRecord, PostListFilter, PostsRepo, RepoError, ViewOutcome,
};
use pressroom::cache::{CacheConfig, ReadCache};
use pressroom::counters::{CounterFlusher, MemoryCounterStore};
use pressroom::domain::analytics::{AnalyticsRecord, click_through_rate};
use pressroom::domain::entities::{CategoryRecord, HeadingRecord, PostListRecord, PostRecord};
use pressroom::domain::types::{EntityKind, NameOrdering, PostStatus, SortKey};
use pressroom::infra::http::ApiState;
use time::OffsetDateTime;
use uuid::Uuid;

pub const PAGE_SIZE: u32 = 10;

#[derive(Default)]
struct State {
    posts: Vec<PostRecord>,
    categories: Vec<CategoryRecord>,
    headings: Vec<HeadingRecord>,
    analytics: HashMap<AnalyticsTarget, AnalyticsRecord>,
    views: HashSet<(AnalyticsTarget, String)>,
    jobs: Vec<NewJobRecord>,
    // Post deleted just before the next click or time-on-page write lands.
    doomed_post: Option<Uuid>,
}

/// In-memory stand-in for every repository the services depend on.
#[derive(Default)]
pub struct MemoryBlog {
    state: Mutex<State>,
    fail_impressions: AtomicBool,
    list_builds: AtomicUsize,
    clock: AtomicUsize,
}

impl MemoryBlog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake state lock")
    }

    // Strictly increasing timestamps so insertion order drives "newest".
    fn tick(&self) -> OffsetDateTime {
        let step = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        OffsetDateTime::UNIX_EPOCH + time::Duration::days(19_000) + time::Duration::minutes(step)
    }

    pub fn add_category(&self, name: &str, slug: &str, parent_id: Option<Uuid>) -> CategoryRecord {
        let now = self.tick();
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            title: Some(format!("{name} articles")),
            description: None,
            thumbnail: None,
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state().categories.push(category.clone());
        category
    }

    pub fn add_post(&self, title: &str, slug: &str, category_id: Option<Uuid>) -> PostRecord {
        self.add_post_with_status(title, slug, category_id, PostStatus::Published)
    }

    pub fn add_post_with_status(
        &self,
        title: &str,
        slug: &str,
        category_id: Option<Uuid>,
        status: PostStatus,
    ) -> PostRecord {
        let now = self.tick();
        let post = PostRecord {
            id: Uuid::new_v4(),
            category_id,
            title: title.to_string(),
            description: format!("About {title}"),
            content: format!("# {title}\n\nBody of {title}."),
            keywords: String::new(),
            thumbnail: None,
            slug: slug.to_string(),
            status,
            created_at: now,
            updated_at: now,
        };
        self.state().posts.push(post.clone());
        post
    }

    pub fn add_heading(&self, post_id: Uuid, title: &str, level: i16) -> HeadingRecord {
        let mut state = self.state();
        let sort_order = state
            .headings
            .iter()
            .filter(|heading| heading.post_id == post_id)
            .count() as i32;
        let heading = HeadingRecord {
            id: Uuid::new_v4(),
            post_id,
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            level,
            sort_order,
        };
        state.headings.push(heading.clone());
        heading
    }

    pub fn set_views(&self, target: AnalyticsTarget, views: i64) {
        self.state().analytics.entry(target).or_default().views = views;
    }

    pub fn remove_post(&self, id: Uuid) {
        let mut state = self.state();
        state.posts.retain(|post| post.id != id);
        state.analytics.remove(&AnalyticsTarget::post(id));
    }

    /// Delete `id` after it has been resolved but before its next click or
    /// time-on-page write reaches the aggregate.
    pub fn remove_post_before_next_write(&self, id: Uuid) {
        self.state().doomed_post = Some(id);
    }

    fn apply_pending_removal(state: &mut State) {
        if let Some(id) = state.doomed_post.take() {
            state.posts.retain(|post| post.id != id);
            state.analytics.remove(&AnalyticsTarget::post(id));
        }
    }

    pub fn analytics(&self, target: AnalyticsTarget) -> Option<AnalyticsRecord> {
        self.state().analytics.get(&target).copied()
    }

    pub fn jobs(&self) -> Vec<NewJobRecord> {
        self.state().jobs.clone()
    }

    pub fn fail_impression_writes(&self, fail: bool) {
        self.fail_impressions.store(fail, Ordering::SeqCst);
    }

    /// Number of list queries that reached the repository.
    pub fn list_builds(&self) -> usize {
        self.list_builds.load(Ordering::SeqCst)
    }

    fn exists(state: &State, target: AnalyticsTarget) -> bool {
        match target.kind {
            EntityKind::Post => state.posts.iter().any(|post| post.id == target.id),
            EntityKind::Category => state
                .categories
                .iter()
                .any(|category| category.id == target.id),
        }
    }

    fn aggregate<'a>(
        state: &'a mut State,
        target: AnalyticsTarget,
    ) -> Result<&'a mut AnalyticsRecord, RepoError> {
        if !Self::exists(state, target) {
            return Err(RepoError::InvalidInput {
                message: format!("{} {} does not exist", target.kind, target.id),
            });
        }
        Ok(state.analytics.entry(target).or_default())
    }

    fn views_of(state: &State, target: AnalyticsTarget) -> i64 {
        state
            .analytics
            .get(&target)
            .map(|record| record.views)
            .unwrap_or_default()
    }

    fn matching_posts(state: &State, filter: &PostListFilter) -> Vec<PostListRecord> {
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<PostListRecord> = state
            .posts
            .iter()
            .filter(|post| post.status == filter.status)
            .filter(|post| match &filter.category_ids {
                Some(ids) => post.category_id.is_some_and(|id| ids.contains(&id)),
                None => true,
            })
            .filter(|post| match &needle {
                Some(needle) => [&post.title, &post.description, &post.content, &post.keywords]
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle)),
                None => true,
            })
            .map(|post| PostListRecord {
                post: post.clone(),
                category: post.category_id.and_then(|id| {
                    state
                        .categories
                        .iter()
                        .find(|category| category.id == id)
                        .cloned()
                }),
                views: Self::views_of(state, AnalyticsTarget::post(post.id)),
            })
            .collect();

        rows.sort_by_key(|row| row.post.id);
        match filter.ordering {
            Some(NameOrdering::Az) => rows.sort_by(|a, b| a.post.title.cmp(&b.post.title)),
            Some(NameOrdering::Za) => rows.sort_by(|a, b| b.post.title.cmp(&a.post.title)),
            None => {}
        }
        match filter.sort {
            Some(SortKey::MostViewed) => rows.sort_by_key(|row| Reverse(row.views)),
            Some(SortKey::RecentlyUpdated) => rows.sort_by_key(|row| Reverse(row.post.updated_at)),
            Some(SortKey::Newest) => rows.sort_by_key(|row| Reverse(row.post.created_at)),
            None if filter.ordering.is_none() => {
                rows.sort_by_key(|row| Reverse(row.post.created_at))
            }
            None => {}
        }
        rows
    }

    fn matching_categories(state: &State, filter: &CategoryListFilter) -> Vec<CategoryRecord> {
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<(CategoryRecord, i64)> = state
            .categories
            .iter()
            .filter(|category| match filter.level {
                CategoryLevel::Root => category.parent_id.is_none(),
                CategoryLevel::ChildrenOf(parent) => category.parent_id == Some(parent),
            })
            .filter(|category| match &needle {
                Some(needle) => category.name.to_lowercase().contains(needle),
                None => true,
            })
            .map(|category| {
                let views = Self::views_of(state, AnalyticsTarget::category(category.id));
                (category.clone(), views)
            })
            .collect();

        rows.sort_by_key(|(category, _)| category.id);
        match filter.ordering {
            Some(NameOrdering::Az) => rows.sort_by(|a, b| a.0.name.cmp(&b.0.name)),
            Some(NameOrdering::Za) => rows.sort_by(|a, b| b.0.name.cmp(&a.0.name)),
            None => {}
        }
        match filter.sort {
            Some(SortKey::MostViewed) => rows.sort_by_key(|(_, views)| Reverse(*views)),
            Some(SortKey::RecentlyUpdated) => {
                rows.sort_by_key(|(category, _)| Reverse(category.updated_at))
            }
            Some(SortKey::Newest) => rows.sort_by_key(|(category, _)| Reverse(category.created_at)),
            None if filter.ordering.is_none() => {
                rows.sort_by_key(|(category, _)| Reverse(category.created_at))
            }
            None => {}
        }
        rows.into_iter().map(|(category, _)| category).collect()
    }
}

fn page_of<T>(rows: Vec<T>, page: PageRequest) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl PostsRepo for MemoryBlog {
    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostListRecord>, RepoError> {
        let state = self.state();
        Ok(page_of(Self::matching_posts(&state, filter), page))
    }

    async fn count_posts(&self, filter: &PostListFilter) -> Result<u64, RepoError> {
        self.list_builds.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        Ok(Self::matching_posts(&state, filter).len() as u64)
    }

    async fn find_by_slug(
        &self,
        slug: &str,
        status: PostStatus,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .state()
            .posts
            .iter()
            .find(|post| post.slug == slug && post.status == status)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state().posts.iter().find(|post| post.id == id).cloned())
    }

    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError> {
        let mut headings: Vec<HeadingRecord> = self
            .state()
            .headings
            .iter()
            .filter(|heading| heading.post_id == post_id)
            .cloned()
            .collect();
        headings.sort_by_key(|heading| heading.sort_order);
        Ok(headings)
    }

    async fn view_count(&self, post_id: Uuid) -> Result<i64, RepoError> {
        Ok(Self::views_of(&self.state(), AnalyticsTarget::post(post_id)))
    }
}

#[async_trait]
impl CategoriesRepo for MemoryBlog {
    async fn list_categories(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> Result<Vec<CategoryRecord>, RepoError> {
        let state = self.state();
        Ok(page_of(Self::matching_categories(&state, filter), page))
    }

    async fn count_categories(&self, filter: &CategoryListFilter) -> Result<u64, RepoError> {
        self.list_builds.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        Ok(Self::matching_categories(&state, filter).len() as u64)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self
            .state()
            .categories
            .iter()
            .find(|category| category.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self
            .state()
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned())
    }
}

#[async_trait]
impl AnalyticsRepo for MemoryBlog {
    async fn entity_exists(&self, target: AnalyticsTarget) -> Result<bool, RepoError> {
        Ok(Self::exists(&self.state(), target))
    }

    async fn add_impressions(
        &self,
        target: AnalyticsTarget,
        delta: i64,
    ) -> Result<AnalyticsRecord, RepoError> {
        if self.fail_impressions.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let mut state = self.state();
        let record = Self::aggregate(&mut state, target)?;
        record.impressions += delta;
        record.click_through_rate = click_through_rate(record.clicks, record.impressions);
        Ok(*record)
    }

    async fn increment_clicks(
        &self,
        target: AnalyticsTarget,
    ) -> Result<AnalyticsRecord, RepoError> {
        let mut state = self.state();
        Self::apply_pending_removal(&mut state);
        let record = Self::aggregate(&mut state, target)?;
        record.clicks += 1;
        record.click_through_rate = click_through_rate(record.clicks, record.impressions);
        Ok(*record)
    }

    async fn record_view(
        &self,
        target: AnalyticsTarget,
        address: &str,
    ) -> Result<ViewOutcome, RepoError> {
        let mut state = self.state();
        Self::aggregate(&mut state, target)?;
        let first = state.views.insert((target, address.to_string()));
        let record = state.analytics.entry(target).or_default();
        if first {
            record.views += 1;
            Ok(ViewOutcome::Counted(*record))
        } else {
            Ok(ViewOutcome::Duplicate(*record))
        }
    }

    async fn set_avg_time_on_page(
        &self,
        target: AnalyticsTarget,
        seconds: f64,
    ) -> Result<AnalyticsRecord, RepoError> {
        let mut state = self.state();
        Self::apply_pending_removal(&mut state);
        let record = Self::aggregate(&mut state, target)?;
        record.avg_time_on_page = seconds;
        Ok(*record)
    }

    async fn find_analytics(
        &self,
        target: AnalyticsTarget,
    ) -> Result<Option<AnalyticsRecord>, RepoError> {
        Ok(self.analytics(target))
    }
}

#[async_trait]
impl JobsRepo for MemoryBlog {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut state = self.state();
        state.jobs.push(job);
        Ok(format!("job-{}", state.jobs.len()))
    }
}

/// Every service wired over one [`MemoryBlog`].
pub struct Harness {
    pub blog: Arc<MemoryBlog>,
    pub counters: Arc<MemoryCounterStore>,
    pub flusher: CounterFlusher,
    pub posts: Arc<PostQueryService>,
    pub categories: Arc<CategoryQueryService>,
    pub analytics: Arc<AnalyticsService>,
}

impl Harness {
    pub fn new(blog: Arc<MemoryBlog>) -> Self {
        Self::with_cache(blog, None)
    }

    pub fn cached(blog: Arc<MemoryBlog>, ttl: Duration) -> Self {
        let config = CacheConfig {
            ttl,
            ..Default::default()
        };
        Self::with_cache(blog, Some(Arc::new(ReadCache::new(&config))))
    }

    fn with_cache(blog: Arc<MemoryBlog>, cache: Option<Arc<ReadCache>>) -> Self {
        let counters = Arc::new(MemoryCounterStore::new());
        let listing = Listing::new(cache, counters.clone());
        let posts = Arc::new(PostQueryService::new(
            blog.clone(),
            blog.clone(),
            listing.clone(),
            PAGE_SIZE,
        ));
        let categories = Arc::new(CategoryQueryService::new(blog.clone(), listing, PAGE_SIZE));
        let analytics = Arc::new(AnalyticsService::new(
            blog.clone(),
            blog.clone(),
            blog.clone(),
            blog.clone(),
        ));
        let flusher = CounterFlusher::new(counters.clone(), blog.clone());
        Self {
            blog,
            counters,
            flusher,
            posts,
            categories,
            analytics,
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            posts: self.posts.clone(),
            categories: self.categories.clone(),
            analytics: self.analytics.clone(),
        }
    }
}

pub fn payload_json(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload).expect("payload is JSON")
}

/// Slugs of the `results` array of a list envelope, in order.
pub fn result_slugs(payload: &[u8]) -> Vec<String> {
    payload_json(payload)["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|item| item["slug"].as_str().expect("slug").to_string())
        .collect()
}
