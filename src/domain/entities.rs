//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::PostStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub slug: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub content: String,
    pub keywords: String,
    pub thumbnail: Option<String>,
    pub slug: String,
    pub status: PostStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with its category and current durable view count, as listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListRecord {
    pub post: PostRecord,
    pub category: Option<CategoryRecord>,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub slug: String,
    pub level: i16,
    pub sort_order: i32,
}
