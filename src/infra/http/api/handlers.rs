use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use pressroom_api_types::{
    AnalyticsSnapshot, ClickRequest, ClickResponse, DetailEnvelope, TimeOnPageRequest,
};
use serde::Deserialize;

use crate::application::categories::CategoryQuery;
use crate::application::posts::PostQuery;
use crate::application::repos::AnalyticsTarget;
use crate::domain::analytics::AnalyticsRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{EntityKind, NameOrdering, SortKey};
use crate::infra::http::client::ClientAddress;

use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    pub search: Option<String>,
    pub sorting: Option<String>,
    pub ordering: Option<String>,
    /// Comma-separated category slugs or ids.
    pub category: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListParams {
    pub parent: Option<String>,
    pub search: Option<String>,
    pub sorting: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPostsParams {
    pub slug: Option<String>,
    pub search: Option<String>,
    pub sorting: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlugParams {
    pub slug: Option<String>,
}

pub async fn list_posts(
    State(state): State<ApiState>,
    Query(params): Query<PostListParams>,
) -> Result<Response, ApiError> {
    let query = PostQuery {
        search: params.search,
        categories: split_selectors(params.category.as_deref()),
        sorting: parse_optional::<SortKey>(params.sorting.as_deref())?,
        ordering: parse_optional::<NameOrdering>(params.ordering.as_deref())?,
        page: params.page.unwrap_or(1),
        status: None,
    };
    let page = state.posts.list_posts(query).await?;
    Ok(json_bytes(page.payload))
}

pub async fn get_post(
    State(state): State<ApiState>,
    ClientAddress(address): ClientAddress,
    Query(params): Query<SlugParams>,
) -> Result<Response, ApiError> {
    let slug = required_slug(params.slug)?;
    let detail = state.posts.post_detail(&slug).await?;
    state
        .analytics
        .schedule_view(AnalyticsTarget::post(detail.id), address);
    Ok(json_bytes(detail.payload))
}

pub async fn post_headings(
    State(state): State<ApiState>,
    Query(params): Query<SlugParams>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = required_slug(params.slug)?;
    let headings = state.posts.post_headings(&slug).await?;
    Ok(Json(DetailEnvelope::ok(headings)))
}

pub async fn post_analytics(
    State(state): State<ApiState>,
    Query(params): Query<SlugParams>,
) -> Result<impl IntoResponse, ApiError> {
    analytics_response(&state, EntityKind::Post, params).await
}

pub async fn increment_post_click(
    State(state): State<ApiState>,
    Json(body): Json<ClickRequest>,
) -> Result<impl IntoResponse, ApiError> {
    increment_click(&state, EntityKind::Post, body).await
}

pub async fn post_time_on_page(
    State(state): State<ApiState>,
    Json(body): Json<TimeOnPageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = required_slug(Some(body.slug))?;
    let record = state
        .analytics
        .record_time_on_page(EntityKind::Post, &slug, body.seconds)
        .await?;
    Ok(Json(DetailEnvelope::ok(snapshot(record))))
}

pub async fn list_categories(
    State(state): State<ApiState>,
    Query(params): Query<CategoryListParams>,
) -> Result<Response, ApiError> {
    let query = CategoryQuery {
        parent: params.parent,
        search: params.search,
        sorting: parse_optional::<SortKey>(params.sorting.as_deref())?,
        ordering: parse_optional::<NameOrdering>(params.ordering.as_deref())?,
        page: params.page.unwrap_or(1),
    };
    let page = state.categories.list_categories(query).await?;
    Ok(json_bytes(page.payload))
}

pub async fn category_posts(
    State(state): State<ApiState>,
    ClientAddress(address): ClientAddress,
    Query(params): Query<CategoryPostsParams>,
) -> Result<Response, ApiError> {
    let slug = required_slug(params.slug)?;
    let query = PostQuery {
        search: params.search,
        sorting: parse_optional::<SortKey>(params.sorting.as_deref())?,
        ordering: parse_optional::<NameOrdering>(params.ordering.as_deref())?,
        page: params.page.unwrap_or(1),
        ..PostQuery::default()
    };
    let listed = state.posts.category_posts(&slug, query).await?;
    state
        .analytics
        .schedule_view(AnalyticsTarget::category(listed.category.id), address);
    Ok(json_bytes(listed.page.payload))
}

pub async fn increment_category_click(
    State(state): State<ApiState>,
    Json(body): Json<ClickRequest>,
) -> Result<impl IntoResponse, ApiError> {
    increment_click(&state, EntityKind::Category, body).await
}

pub async fn category_analytics(
    State(state): State<ApiState>,
    Query(params): Query<SlugParams>,
) -> Result<impl IntoResponse, ApiError> {
    analytics_response(&state, EntityKind::Category, params).await
}

async fn increment_click(
    state: &ApiState,
    kind: EntityKind,
    body: ClickRequest,
) -> Result<Json<ClickResponse>, ApiError> {
    let slug = required_slug(Some(body.slug))?;
    let clicks = state.analytics.increment_click(kind, &slug).await?;
    Ok(Json(ClickResponse {
        message: "Click recorded".to_string(),
        clicks,
    }))
}

async fn analytics_response(
    state: &ApiState,
    kind: EntityKind,
    params: SlugParams,
) -> Result<Json<DetailEnvelope<AnalyticsSnapshot>>, ApiError> {
    let slug = required_slug(params.slug)?;
    let record = state.analytics.analytics_for(kind, &slug).await?;
    Ok(Json(DetailEnvelope::ok(snapshot(record))))
}

fn snapshot(record: AnalyticsRecord) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        impressions: record.impressions,
        views: record.views,
        clicks: record.clicks,
        click_through_rate: record.click_through_rate,
        avg_time_on_page: record.avg_time_on_page,
    }
}

/// Cached bodies are already serialized; send them as-is.
fn json_bytes(payload: Bytes) -> Response {
    let mut response = payload.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn required_slug(slug: Option<String>) -> Result<String, ApiError> {
    slug.map(|slug| slug.trim().to_string())
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing slug", Some("`slug` is required".into())))
}

fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(T::from_str)
        .transpose()
        .map_err(ApiError::from)
}

fn split_selectors(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
