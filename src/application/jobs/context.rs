use std::sync::Arc;

use crate::application::repos::AnalyticsRepo;

/// Shared context passed to queued job workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub analytics: Arc<dyn AnalyticsRepo>,
}

impl JobWorkerContext {
    pub fn new(analytics: Arc<dyn AnalyticsRepo>) -> Self {
        Self { analytics }
    }
}
