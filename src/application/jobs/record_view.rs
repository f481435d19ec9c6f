use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    application::repos::{AnalyticsTarget, JobsRepo, RepoError, ViewOutcome},
    domain::types::{EntityKind, JobType},
};

use super::{context::JobWorkerContext, queue::enqueue_job};

const SOURCE: &str = "application::jobs::process_record_view_job";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordViewJobPayload {
    pub kind: EntityKind,
    pub id: Uuid,
    pub address: String,
}

/// Redelivery is harmless: the view gate is keyed by address.
pub async fn enqueue_record_view_job<J: JobsRepo + ?Sized>(
    repo: &J,
    target: AnalyticsTarget,
    address: String,
) -> Result<String, RepoError> {
    let payload = RecordViewJobPayload {
        kind: target.kind,
        id: target.id,
        address,
    };
    enqueue_job(repo, JobType::RecordView, &payload, None, 1, 0).await
}

/// Offer the view to the de-duplication gate. Failures are logged and dropped
/// so a bad event never stalls the worker.
pub async fn process_record_view_job(
    payload: RecordViewJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let target = AnalyticsTarget::new(payload.kind, payload.id);

    match context.analytics.record_view(target, &payload.address).await {
        Ok(ViewOutcome::Counted(record)) => {
            debug!(
                target = SOURCE,
                kind = payload.kind.as_str(),
                id = %payload.id,
                views = record.views,
                "view counted"
            );
        }
        Ok(ViewOutcome::Duplicate(_)) => {
            debug!(
                target = SOURCE,
                kind = payload.kind.as_str(),
                id = %payload.id,
                "repeat view ignored"
            );
        }
        Err(err) => {
            warn!(
                target = SOURCE,
                kind = payload.kind.as_str(),
                id = %payload.id,
                error = %err,
                "failed to record view"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_snake_case_kind() {
        let payload = RecordViewJobPayload {
            kind: EntityKind::Category,
            id: Uuid::nil(),
            address: "10.0.0.1".to_string(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["kind"], "category");
        assert_eq!(value["address"], "10.0.0.1");
    }
}
