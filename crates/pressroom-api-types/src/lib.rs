//! Wire types shared by the pressroom blog API and its clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Publication state of a post (mirrors Postgres enum `post_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "post_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
}

/// Envelope for paginated list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub success: bool,
    pub status: u16,
    pub count: u64,
    pub page: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> ListEnvelope<T> {
    /// Build an envelope for `page` (1-based) given the total number of matching rows.
    pub fn page(results: Vec<T>, count: u64, page: u32, page_size: u32) -> Self {
        let page_size = u64::from(page_size.max(1));
        let last_page = count.div_ceil(page_size);
        let next = (u64::from(page) < last_page).then(|| page + 1);
        let previous = (page > 1).then(|| page - 1);
        Self {
            success: true,
            status: 200,
            count,
            page,
            next,
            previous,
            results,
        }
    }
}

/// Envelope for single-resource responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailEnvelope<T> {
    pub success: bool,
    pub status: u16,
    pub results: T,
}

impl<T> DetailEnvelope<T> {
    pub fn ok(results: T) -> Self {
        Self {
            success: true,
            status: 200,
            results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryItem {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub slug: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostListItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub slug: String,
    pub category: Option<CategoryItem>,
    pub view_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingItem {
    pub title: String,
    pub slug: String,
    pub level: i16,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub keywords: String,
    pub thumbnail: Option<String>,
    pub slug: String,
    pub status: PostStatus,
    pub category: Option<CategoryItem>,
    pub headings: Vec<HeadingItem>,
    pub view_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub impressions: i64,
    pub views: i64,
    pub clicks: i64,
    pub click_through_rate: f64,
    pub avg_time_on_page: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRequest {
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickResponse {
    pub message: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOnPageRequest {
    pub slug: String,
    pub seconds: f64,
}
