//! Analytics aggregate and its derived click-through rate.

use serde::Serialize;

/// Lifetime counters for one post or category.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AnalyticsRecord {
    pub impressions: i64,
    pub views: i64,
    pub clicks: i64,
    pub click_through_rate: f64,
    pub avg_time_on_page: f64,
}

impl AnalyticsRecord {
    /// True when the stored rate matches the counters it is derived from.
    pub fn rate_is_consistent(&self) -> bool {
        (self.click_through_rate - click_through_rate(self.clicks, self.impressions)).abs()
            < 1e-9
    }
}

/// `clicks / impressions * 100`, or zero before the first impression.
pub fn click_through_rate(clicks: i64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    clicks as f64 / impressions as f64 * 100.0
}

/// SQL expression computing the rate from the `impressions` and `clicks` columns of
/// the row being written. Kept next to [`click_through_rate`] so both stay in step.
pub const CLICK_THROUGH_RATE_SQL: &str = "CASE WHEN {impressions} > 0 \
    THEN ({clicks})::double precision / ({impressions})::double precision * 100 \
    ELSE 0 END";

/// Render [`CLICK_THROUGH_RATE_SQL`] for concrete column expressions.
pub fn click_through_rate_sql(impressions: &str, clicks: &str) -> String {
    CLICK_THROUGH_RATE_SQL
        .replace("{impressions}", impressions)
        .replace("{clicks}", clicks)
}
