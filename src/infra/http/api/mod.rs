pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

use crate::infra::http::RouterState;

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/api/blog/posts", get(handlers::list_posts))
        .route("/api/blog/post", get(handlers::get_post))
        .route("/api/blog/post/headings", get(handlers::post_headings))
        .route("/api/blog/post/analytics", get(handlers::post_analytics))
        .route(
            "/api/blog/post/increment_click",
            post(handlers::increment_post_click),
        )
        .route(
            "/api/blog/post/time_on_page",
            post(handlers::post_time_on_page),
        )
        .route("/api/blog/categories", get(handlers::list_categories))
        .route("/api/blog/category/posts", get(handlers::category_posts))
        .route(
            "/api/blog/category/increment_click",
            post(handlers::increment_category_click),
        )
        .route(
            "/api/blog/category/analytics",
            get(handlers::category_analytics),
        )
        .with_state(state)
}
