use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{AnalyticsRepo, AnalyticsTarget, RepoError};
use crate::domain::types::EntityKind;

use super::store::{CounterStore, PendingCount};

const SOURCE: &str = "counters::flush";
pub(crate) const METRIC_FLUSH_WRITTEN_TOTAL: &str = "pressroom_counter_flush_written_total";
pub(crate) const METRIC_FLUSH_DISCARDED_TOTAL: &str = "pressroom_counter_flush_discarded_total";
pub(crate) const METRIC_FLUSH_FAILED_TOTAL: &str = "pressroom_counter_flush_failed_total";
pub(crate) const METRIC_FLUSH_MS: &str = "pressroom_counter_flush_ms";

/// Per-cycle tally of drained keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Keys whose delta reached durable storage.
    pub flushed: usize,
    /// Keys dropped without a write (malformed id, zero delta, entity gone).
    pub discarded: usize,
    /// Keys whose write failed; their deltas were restored for the next cycle.
    pub failed: usize,
    /// Sum of impressions written.
    pub impressions: u64,
}

enum KeyOutcome {
    Written(u64),
    Discarded,
    Failed,
}

/// Drains the [`CounterStore`] into the `impressions` column of each aggregate.
#[derive(Clone)]
pub struct CounterFlusher {
    store: Arc<dyn CounterStore>,
    analytics: Arc<dyn AnalyticsRepo>,
}

impl CounterFlusher {
    pub fn new(store: Arc<dyn CounterStore>, analytics: Arc<dyn AnalyticsRepo>) -> Self {
        Self { store, analytics }
    }

    /// Run one flush cycle over every entity kind. Never fails; problems with a
    /// single key are logged and do not affect the others.
    pub async fn flush_once(&self) -> FlushReport {
        let started_at = Instant::now();
        let mut report = FlushReport::default();

        for kind in EntityKind::ALL {
            for pending in self.store.drain_matching(kind) {
                match self.flush_key(&pending).await {
                    KeyOutcome::Written(delta) => {
                        report.flushed += 1;
                        report.impressions += delta;
                    }
                    KeyOutcome::Discarded => report.discarded += 1,
                    KeyOutcome::Failed => {
                        report.failed += 1;
                        self.store.restore(pending);
                    }
                }
            }
        }

        counter!(METRIC_FLUSH_WRITTEN_TOTAL).increment(report.flushed as u64);
        counter!(METRIC_FLUSH_DISCARDED_TOTAL).increment(report.discarded as u64);
        counter!(METRIC_FLUSH_FAILED_TOTAL).increment(report.failed as u64);
        histogram!(METRIC_FLUSH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        if report != FlushReport::default() {
            info!(
                target = SOURCE,
                flushed = report.flushed,
                discarded = report.discarded,
                failed = report.failed,
                impressions = report.impressions,
                "counter flush complete"
            );
        }

        report
    }

    async fn flush_key(&self, pending: &PendingCount) -> KeyOutcome {
        let kind = pending.kind.as_str();

        let Ok(id) = Uuid::parse_str(&pending.id) else {
            warn!(
                target = SOURCE,
                kind,
                id = %pending.id,
                delta = pending.delta,
                "discarding counter with malformed id"
            );
            return KeyOutcome::Discarded;
        };

        if pending.delta == 0 {
            debug!(target = SOURCE, kind, %id, "discarding empty counter");
            return KeyOutcome::Discarded;
        }

        let target = AnalyticsTarget::new(pending.kind, id);
        match self.analytics.entity_exists(target).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    target = SOURCE,
                    kind,
                    %id,
                    delta = pending.delta,
                    "discarding counter for missing entity"
                );
                return KeyOutcome::Discarded;
            }
            Err(err) => {
                warn!(target = SOURCE, kind, %id, error = %err, "entity lookup failed");
                return KeyOutcome::Failed;
            }
        }

        let Ok(delta) = i64::try_from(pending.delta) else {
            warn!(
                target = SOURCE,
                kind,
                %id,
                delta = pending.delta,
                "counter delta exceeds the impressions column, delta restored"
            );
            return KeyOutcome::Failed;
        };
        match self.analytics.add_impressions(target, delta).await {
            Ok(_) => KeyOutcome::Written(pending.delta),
            // Deleted between the lookup and the write.
            Err(RepoError::InvalidInput { message }) => {
                info!(
                    target = SOURCE,
                    kind,
                    %id,
                    detail = %message,
                    "discarding counter for entity removed during flush"
                );
                KeyOutcome::Discarded
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    kind,
                    %id,
                    delta = pending.delta,
                    error = %err,
                    "impression write failed, delta restored"
                );
                KeyOutcome::Failed
            }
        }
    }
}
