//! Public post queries: listing, category listing, detail and headings.

use std::sync::Arc;

use bytes::Bytes;
use pressroom_api_types::{CategoryItem, DetailEnvelope, HeadingItem, PostDetail, PostListItem};
use uuid::Uuid;

use crate::application::listing::{Listing, QueryError, encode_page, non_blank};
use crate::application::pagination::PageRequest;
use crate::application::repos::{CategoriesRepo, PostListFilter, PostsRepo};
use crate::cache::{CacheKey, CacheNamespace, CachedQuery, QuerySignature};
use crate::domain::entities::{CategoryRecord, HeadingRecord, PostListRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{EntityKind, NameOrdering, PostStatus, SortKey};

#[derive(Debug, Clone)]
pub struct PostQuery {
    pub search: Option<String>,
    /// Category selectors; each is an id or a slug.
    pub categories: Vec<String>,
    pub sorting: Option<SortKey>,
    pub ordering: Option<NameOrdering>,
    pub page: u32,
    /// Defaults to published; drafts are only listed when asked for.
    pub status: Option<PostStatus>,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            search: None,
            categories: Vec::new(),
            sorting: None,
            ordering: None,
            page: 1,
            status: None,
        }
    }
}

impl PostQuery {
    fn signature(&self, page_size: u32) -> QuerySignature {
        QuerySignature {
            search: self.search.clone(),
            selectors: self.categories.clone(),
            parent: None,
            status: Some(self.status()),
            sorting: self.sorting,
            ordering: self.ordering,
            page: self.page,
            page_size,
        }
    }

    fn status(&self) -> PostStatus {
        self.status.unwrap_or(PostStatus::Published)
    }
}

/// Posts of one category plus the category itself.
#[derive(Debug, Clone)]
pub struct CategoryPosts {
    pub category: CategoryRecord,
    pub page: CachedQuery,
}

/// Serialized detail body and the id of the post it describes.
#[derive(Debug, Clone)]
pub struct PostDetailPage {
    pub id: Uuid,
    pub payload: Bytes,
}

#[derive(Clone)]
pub struct PostQueryService {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    listing: Listing,
    page_size: u32,
}

impl PostQueryService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        listing: Listing,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            categories,
            listing,
            page_size,
        }
    }

    pub async fn list_posts(&self, query: PostQuery) -> Result<CachedQuery, QueryError> {
        let key = CacheKey::list(CacheNamespace::PostList, query.signature(self.page_size))?;
        self.listing
            .serve(key, EntityKind::Post, move || async move {
                let category_ids = self.resolve_categories(&query.categories).await?;
                self.build_page(&query, category_ids).await
            })
            .await
    }

    /// Posts filed under the category with `slug`.
    pub async fn category_posts(
        &self,
        slug: &str,
        query: PostQuery,
    ) -> Result<CategoryPosts, QueryError> {
        let category = self
            .categories
            .find_by_slug(slug.trim())
            .await?
            .ok_or_else(|| DomainError::not_found("category", slug))?;

        let mut signature = query.signature(self.page_size);
        signature.parent = Some(category.id.to_string());
        let key = CacheKey::list(CacheNamespace::CategoryPosts, signature)?;

        let category_id = category.id;
        let page = self
            .listing
            .serve(key, EntityKind::Post, move || async move {
                self.build_page(&query, Some(vec![category_id])).await
            })
            .await?;

        Ok(CategoryPosts { category, page })
    }

    pub async fn post_detail(&self, slug: &str) -> Result<PostDetailPage, QueryError> {
        let slug = slug.trim();
        let key = CacheKey::post_detail(slug)?;
        let cached = self
            .listing
            .cached(key, move || self.build_detail(slug))
            .await?;

        let id = cached
            .ids
            .first()
            .copied()
            .ok_or_else(|| DomainError::not_found("post", slug))?;
        Ok(PostDetailPage {
            id,
            payload: cached.payload,
        })
    }

    pub async fn post_headings(&self, slug: &str) -> Result<Vec<HeadingItem>, QueryError> {
        let post = self.find_published(slug).await?;
        let headings = self.posts.list_headings(post.id).await?;
        Ok(headings.into_iter().map(heading_item).collect())
    }

    /// Turn selectors into category ids: each selector is tried as an id first,
    /// then as a slug. Unknown selectors are skipped; if none resolve, nothing
    /// can match.
    async fn resolve_categories(&self, selectors: &[String]) -> Result<Option<Vec<Uuid>>, QueryError> {
        let selectors: Vec<&str> = selectors
            .iter()
            .map(|selector| selector.trim())
            .filter(|selector| !selector.is_empty())
            .collect();
        if selectors.is_empty() {
            return Ok(None);
        }

        let mut ids = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let mut found = match Uuid::parse_str(selector) {
                Ok(id) => self.categories.find_by_id(id).await?,
                Err(_) => None,
            };
            if found.is_none() {
                found = self.categories.find_by_slug(selector).await?;
            }
            match found {
                Some(category) if !ids.contains(&category.id) => ids.push(category.id),
                Some(_) => {}
                None => tracing::debug!(selector, "category selector matched nothing"),
            }
        }

        if ids.is_empty() {
            return Err(QueryError::NoResults { entity: "posts" });
        }
        Ok(Some(ids))
    }

    async fn build_page(
        &self,
        query: &PostQuery,
        category_ids: Option<Vec<Uuid>>,
    ) -> Result<CachedQuery, QueryError> {
        let filter = PostListFilter {
            status: query.status(),
            search: non_blank(query.search.as_deref()),
            category_ids,
            sort: query.sorting,
            ordering: query.ordering,
        };
        let page = PageRequest::new(query.page, self.page_size)?;

        let total = self.posts.count_posts(&filter).await?;
        if total == 0 {
            return Err(QueryError::NoResults { entity: "posts" });
        }

        let rows = self.posts.list_posts(&filter, page).await?;
        if rows.is_empty() {
            return Err(QueryError::PageOutOfRange { page: page.page });
        }

        let ids = rows.iter().map(|row| row.post.id).collect();
        let items = rows.into_iter().map(post_list_item).collect();
        encode_page(items, ids, total, page)
    }

    async fn build_detail(&self, slug: &str) -> Result<CachedQuery, QueryError> {
        let post = self.find_published(slug).await?;
        let category = match post.category_id {
            Some(id) => self.categories.find_by_id(id).await?,
            None => None,
        };
        let headings = self.posts.list_headings(post.id).await?;
        let views = self.posts.view_count(post.id).await?;

        let id = post.id;
        let detail = post_detail(post, category, headings, views);
        let payload = serde_json::to_vec(&DetailEnvelope::ok(detail))?;
        Ok(CachedQuery {
            payload: Bytes::from(payload),
            ids: vec![id],
        })
    }

    async fn find_published(&self, slug: &str) -> Result<PostRecord, QueryError> {
        self.posts
            .find_by_slug(slug.trim(), PostStatus::Published)
            .await?
            .ok_or_else(|| DomainError::not_found("post", slug).into())
    }
}

pub(crate) fn category_item(category: CategoryRecord) -> CategoryItem {
    CategoryItem {
        id: category.id,
        name: category.name,
        title: category.title,
        description: category.description,
        thumbnail: category.thumbnail,
        slug: category.slug,
        parent_id: category.parent_id,
    }
}

fn post_list_item(row: PostListRecord) -> PostListItem {
    let PostListRecord {
        post,
        category,
        views,
    } = row;
    PostListItem {
        id: post.id,
        title: post.title,
        description: post.description,
        thumbnail: post.thumbnail,
        slug: post.slug,
        category: category.map(category_item),
        view_count: views,
    }
}

fn heading_item(heading: HeadingRecord) -> HeadingItem {
    HeadingItem {
        title: heading.title,
        slug: heading.slug,
        level: heading.level,
        order: heading.sort_order,
    }
}

fn post_detail(
    post: PostRecord,
    category: Option<CategoryRecord>,
    headings: Vec<HeadingRecord>,
    views: i64,
) -> PostDetail {
    PostDetail {
        id: post.id,
        title: post.title,
        description: post.description,
        content: post.content,
        keywords: post.keywords,
        thumbnail: post.thumbnail,
        slug: post.slug,
        status: post.status,
        category: category.map(category_item),
        headings: headings.into_iter().map(heading_item).collect(),
        view_count: views,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}
