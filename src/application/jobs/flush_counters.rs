//! Cron-driven flush of pending impression counts.

use std::str::FromStr;

use apalis::prelude::*;
use apalis_cron::Schedule;
use tracing::debug;

use crate::counters::CounterFlusher;

/// Marker for the cron-triggered flush.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct FlushCountersJob;

impl From<chrono::DateTime<chrono::Utc>> for FlushCountersJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct FlushCountersContext {
    pub flusher: CounterFlusher,
}

/// Never fails: per-key errors are reported by the flusher and the keys stay
/// pending for the next tick.
pub async fn process_flush_counters_job(
    _job: FlushCountersJob,
    ctx: Data<FlushCountersContext>,
) -> Result<(), apalis::prelude::Error> {
    let report = ctx.flusher.flush_once().await;
    debug!(
        target = "application::jobs::process_flush_counters_job",
        flushed = report.flushed,
        discarded = report.discarded,
        failed = report.failed,
        "flush tick finished"
    );
    Ok(())
}

/// Parse a six-field cron expression (seconds first).
pub fn flush_counters_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression.trim()).map_err(|err| err.to_string())
}
