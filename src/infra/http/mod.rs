pub mod api;
pub mod client;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use client::ClientAddress;

use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HealthState {
    pub db: Arc<PostgresRepositories>,
}

#[derive(Clone)]
pub struct RouterState {
    pub api: ApiState,
    pub health: Option<HealthState>,
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

/// Blog API plus `/health/db` when a database is attached.
pub fn build_router(state: RouterState) -> Router {
    let mut router = build_api_router(state.clone());

    if let Some(health) = state.health.clone() {
        router = router.merge(
            Router::new()
                .route("/health/db", get(db_health))
                .with_state(health),
        );
    }

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HealthState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
