use time::OffsetDateTime;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::types::JobType,
};

/// Enqueue a job with the provided payload, returning the id assigned by the queue.
pub async fn enqueue_job<J, P>(
    repo: &J,
    job_type: JobType,
    payload: &P,
    run_at: Option<OffsetDateTime>,
    max_attempts: i32,
    priority: i32,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
    P: serde::Serialize,
{
    let payload = serde_json::to_value(payload)
        .map_err(|err| RepoError::from_persistence(err.to_string()))?;
    let record = NewJobRecord {
        job_type,
        payload,
        run_at: run_at.unwrap_or_else(OffsetDateTime::now_utc),
        max_attempts,
        priority,
    };

    repo.enqueue_job(record).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingJobs {
        jobs: Mutex<Vec<NewJobRecord>>,
    }

    #[async_trait]
    impl JobsRepo for RecordingJobs {
        async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
            let mut jobs = self.jobs.lock().expect("jobs lock");
            jobs.push(job);
            Ok(jobs.len().to_string())
        }
    }

    #[tokio::test]
    async fn serializes_payload_and_defaults_run_at_to_now() {
        let repo = RecordingJobs::default();
        let before = OffsetDateTime::now_utc();

        let id = enqueue_job(
            &repo,
            JobType::RecordView,
            &serde_json::json!({"slug": "hello"}),
            None,
            3,
            5,
        )
        .await
        .expect("enqueue");

        assert_eq!(id, "1");
        let jobs = repo.jobs.lock().expect("jobs lock");
        assert_eq!(jobs[0].job_type, JobType::RecordView);
        assert_eq!(jobs[0].payload["slug"], "hello");
        assert_eq!(jobs[0].max_attempts, 3);
        assert_eq!(jobs[0].priority, 5);
        assert!(jobs[0].run_at >= before);
    }
}
