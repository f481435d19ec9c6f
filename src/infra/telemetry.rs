use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "pressroom_read_cache_hit_total",
            Unit::Count,
            "Total number of read cache hits."
        );
        describe_counter!(
            "pressroom_read_cache_miss_total",
            Unit::Count,
            "Total number of read cache misses, expired entries included."
        );
        describe_counter!(
            "pressroom_read_cache_expired_total",
            Unit::Count,
            "Total number of read cache entries dropped on read after their TTL."
        );
        describe_counter!(
            "pressroom_read_cache_evict_total",
            Unit::Count,
            "Total number of read cache evictions due to capacity."
        );
        describe_counter!(
            "pressroom_counter_increment_total",
            Unit::Count,
            "Total number of impressions added to the in-memory counter store."
        );
        describe_counter!(
            "pressroom_counter_flush_written_total",
            Unit::Count,
            "Total number of counter keys written to the analytics tables."
        );
        describe_counter!(
            "pressroom_counter_flush_discarded_total",
            Unit::Count,
            "Total number of counter keys dropped because their entity is gone or the key is malformed."
        );
        describe_counter!(
            "pressroom_counter_flush_failed_total",
            Unit::Count,
            "Total number of counter keys restored after a failed write."
        );
        describe_histogram!(
            "pressroom_counter_flush_ms",
            Unit::Milliseconds,
            "Counter flush cycle latency in milliseconds."
        );
    });
}
