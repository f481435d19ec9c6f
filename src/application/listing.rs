//! Cache-or-build orchestration shared by the list endpoints.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use pressroom_api_types::ListEnvelope;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PaginationError};
use crate::application::repos::RepoError;
use crate::cache::{CacheKey, CachedQuery, ReadCache};
use crate::counters::CounterStore;
use crate::domain::error::DomainError;
use crate::domain::types::EntityKind;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The query was valid but matched nothing.
    #[error("No {entity} found")]
    NoResults { entity: &'static str },
    #[error("page {page} is past the last page")]
    PageOutOfRange { page: u32 },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Read cache and impression counters as seen by the query services.
#[derive(Clone)]
pub struct Listing {
    cache: Option<Arc<ReadCache>>,
    counters: Arc<dyn CounterStore>,
}

impl Listing {
    pub fn new(cache: Option<Arc<ReadCache>>, counters: Arc<dyn CounterStore>) -> Self {
        Self { cache, counters }
    }

    /// Serve `key` from the cache or run `build` and store its result. Either way
    /// one impression is recorded for each listed entity.
    pub async fn serve<F, Fut>(
        &self,
        key: CacheKey,
        kind: EntityKind,
        build: F,
    ) -> Result<CachedQuery, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedQuery, QueryError>>,
    {
        let value = self.cached(key, build).await?;
        for id in &value.ids {
            self.counters.increment(kind, &id.to_string());
        }
        Ok(value)
    }

    /// Like [`Listing::serve`] but without recording impressions.
    pub async fn cached<F, Fut>(&self, key: CacheKey, build: F) -> Result<CachedQuery, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedQuery, QueryError>>,
    {
        let Some(cache) = self.cache.as_ref() else {
            return build().await;
        };

        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let built = build().await?;
        cache.set(key, built.clone());
        Ok(built)
    }
}

/// Serialize one page of results into the list envelope.
pub(crate) fn encode_page<T: Serialize>(
    items: Vec<T>,
    ids: Vec<Uuid>,
    total: u64,
    page: PageRequest,
) -> Result<CachedQuery, QueryError> {
    let envelope = ListEnvelope::page(items, total, page.page, page.page_size);
    let payload = serde_json::to_vec(&envelope)?;
    Ok(CachedQuery {
        payload: Bytes::from(payload),
        ids,
    })
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
