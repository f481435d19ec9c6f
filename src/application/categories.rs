//! Public category listing, one tree level at a time.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::listing::{Listing, QueryError, encode_page, non_blank};
use crate::application::pagination::PageRequest;
use crate::application::posts::category_item;
use crate::application::repos::{CategoriesRepo, CategoryLevel, CategoryListFilter};
use crate::cache::{CacheKey, CacheNamespace, CachedQuery, QuerySignature};
use crate::domain::error::DomainError;
use crate::domain::types::{EntityKind, NameOrdering, SortKey};

#[derive(Debug, Clone)]
pub struct CategoryQuery {
    /// Slug or id of the parent; `None` lists root categories.
    pub parent: Option<String>,
    pub search: Option<String>,
    pub sorting: Option<SortKey>,
    pub ordering: Option<NameOrdering>,
    pub page: u32,
}

impl Default for CategoryQuery {
    fn default() -> Self {
        Self {
            parent: None,
            search: None,
            sorting: None,
            ordering: None,
            page: 1,
        }
    }
}

#[derive(Clone)]
pub struct CategoryQueryService {
    categories: Arc<dyn CategoriesRepo>,
    listing: Listing,
    page_size: u32,
}

impl CategoryQueryService {
    pub fn new(categories: Arc<dyn CategoriesRepo>, listing: Listing, page_size: u32) -> Self {
        Self {
            categories,
            listing,
            page_size,
        }
    }

    pub async fn list_categories(&self, query: CategoryQuery) -> Result<CachedQuery, QueryError> {
        let signature = QuerySignature {
            search: query.search.clone(),
            selectors: Vec::new(),
            parent: query.parent.clone(),
            status: None,
            sorting: query.sorting,
            ordering: query.ordering,
            page: query.page,
            page_size: self.page_size,
        };
        let key = CacheKey::list(CacheNamespace::CategoryList, signature)?;

        self.listing
            .serve(key, EntityKind::Category, move || async move {
                self.build_page(query).await
            })
            .await
    }

    async fn build_page(&self, query: CategoryQuery) -> Result<CachedQuery, QueryError> {
        let level = match non_blank(query.parent.as_deref()) {
            Some(parent) => CategoryLevel::ChildrenOf(self.resolve_parent(&parent).await?),
            None => CategoryLevel::Root,
        };
        let filter = CategoryListFilter {
            level,
            search: non_blank(query.search.as_deref()),
            sort: query.sorting,
            ordering: query.ordering,
        };
        let page = PageRequest::new(query.page, self.page_size)?;

        let total = self.categories.count_categories(&filter).await?;
        if total == 0 {
            return Err(QueryError::NoResults {
                entity: "categories",
            });
        }

        let rows = self.categories.list_categories(&filter, page).await?;
        if rows.is_empty() {
            return Err(QueryError::PageOutOfRange { page: page.page });
        }

        let ids = rows.iter().map(|category| category.id).collect();
        let items = rows.into_iter().map(category_item).collect();
        encode_page(items, ids, total, page)
    }

    async fn resolve_parent(&self, selector: &str) -> Result<Uuid, QueryError> {
        if let Ok(id) = Uuid::parse_str(selector) {
            if let Some(category) = self.categories.find_by_id(id).await? {
                return Ok(category.id);
            }
        }
        self.categories
            .find_by_slug(selector)
            .await?
            .map(|category| category.id)
            .ok_or_else(|| DomainError::not_found("category", selector).into())
    }
}
