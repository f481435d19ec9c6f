use std::sync::Arc;

use crate::application::analytics::AnalyticsService;
use crate::application::categories::CategoryQueryService;
use crate::application::posts::PostQueryService;

#[derive(Clone)]
pub struct ApiState {
    pub posts: Arc<PostQueryService>,
    pub categories: Arc<CategoryQueryService>,
    pub analytics: Arc<AnalyticsService>,
}
