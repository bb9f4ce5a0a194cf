//! Traffic aggregation over day-offset and explicit-date windows.
//!
//! Turns raw [`UsageSource`] counters into ranked per-application rows, a
//! device total, and zero-filled hourly series.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use traffic_core::time_utils::{self, TimeRange};
use traffic_core::window::{checked_days_ago, widest_offset};
use traffic_core::{
    AppTrafficData, HourlyBucket, QueryWindow, Result, TotalTrafficData, TrafficError,
    TransportBytes,
};

use crate::source::UsageSource;

/// Hours in one chart series.
pub const HOURS_PER_DAY: u32 = 24;

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Rows sorted descending by total bytes, then by app name.
    pub apps: Vec<AppTrafficData>,
    /// Sum over `apps`.
    pub total: TotalTrafficData,
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Converts usage-source counters into traffic summaries.
///
/// Every query has an `*_at` variant taking the evaluation instant; the
/// plain variant uses the current time.
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn UsageSource>,
    tz: Tz,
}

impl Aggregator {
    /// `tz` decides where local days begin.
    pub fn new(source: Arc<dyn UsageSource>, tz: Tz) -> Self {
        Self { source, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Summaries for the union of "last N days" windows in `offsets`.
    pub fn aggregate_by_day_offsets(&self, offsets: &BTreeSet<i64>) -> Result<Aggregation> {
        self.aggregate_by_day_offsets_at(offsets, Utc::now())
    }

    pub fn aggregate_by_day_offsets_at(
        &self,
        offsets: &BTreeSet<i64>,
        now: DateTime<Utc>,
    ) -> Result<Aggregation> {
        let widest = widest_offset(offsets)?;
        let range = time_utils::day_offset_window(widest, now, self.tz)
            .ok_or_else(|| TrafficError::invalid_window("day offset out of range"))?;
        self.aggregate_range(range)
    }

    /// Summaries for the single local day `days_ago` days before today.
    pub fn aggregate_by_explicit_date(&self, days_ago: i64) -> Result<Aggregation> {
        self.aggregate_by_explicit_date_at(days_ago, Utc::now())
    }

    pub fn aggregate_by_explicit_date_at(
        &self,
        days_ago: i64,
        now: DateTime<Utc>,
    ) -> Result<Aggregation> {
        let days_ago = checked_days_ago(days_ago)?;
        let range = time_utils::single_day_window(days_ago, now, self.tz)
            .ok_or_else(|| TrafficError::invalid_window("date out of range"))?;
        self.aggregate_range(range)
    }

    /// Evaluate `window` as of `now`.
    ///
    /// An explicit date is converted to a days-ago count at this instant, so
    /// the same date keeps resolving correctly as days pass.
    pub fn aggregate_window_at(
        &self,
        window: &QueryWindow,
        now: DateTime<Utc>,
    ) -> Result<Aggregation> {
        match window {
            QueryWindow::DayOffsets(offsets) => self.aggregate_by_day_offsets_at(offsets, now),
            QueryWindow::ExplicitDate(date) => {
                let days_ago = time_utils::days_since(*date, now, self.tz);
                self.aggregate_by_explicit_date_at(days_ago, now)
            }
        }
    }

    /// Device-wide hourly series. `None` means today, live.
    pub fn hourly_totals(&self, days_ago: Option<i64>) -> Result<Vec<HourlyBucket>> {
        self.hourly_totals_at(days_ago, Utc::now())
    }

    pub fn hourly_totals_at(
        &self,
        days_ago: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyBucket>> {
        self.hourly(None, days_ago, now)
    }

    /// Hourly series for one application. `None` means today, live.
    pub fn hourly_for_app(
        &self,
        package_id: &str,
        days_ago: Option<i64>,
    ) -> Result<Vec<HourlyBucket>> {
        self.hourly_for_app_at(package_id, days_ago, Utc::now())
    }

    pub fn hourly_for_app_at(
        &self,
        package_id: &str,
        days_ago: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyBucket>> {
        self.hourly(Some(package_id), days_ago, now)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn aggregate_range(&self, range: TimeRange) -> Result<Aggregation> {
        let counts = self.source.query_byte_counts(range)?;

        let mut apps: Vec<AppTrafficData> = counts
            .iter()
            .map(|(package, counters)| {
                let name = self
                    .source
                    .app_label(package)
                    .unwrap_or_else(|| package.clone());
                AppTrafficData::from_counters(package.as_str(), name, counters)
            })
            .collect();
        rank_rows(&mut apps);

        let total = TotalTrafficData::from_rows(&apps);
        debug!(
            start = %range.start,
            end = %range.end,
            apps = apps.len(),
            total_bytes = total.total_bytes,
            "aggregation complete"
        );

        Ok(Aggregation { apps, total })
    }

    fn hourly(
        &self,
        package: Option<&str>,
        days_ago: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyBucket>> {
        let days_ago = checked_days_ago(days_ago.unwrap_or(0))?;
        let day = time_utils::local_day(days_ago, now, self.tz)
            .ok_or_else(|| TrafficError::invalid_window("date out of range"))?;
        let hours = self.source.query_hourly(day, package)?;
        Ok(fill_hours(&hours))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Sort rows by descending total; ties by app name, then package id.
pub fn rank_rows(rows: &mut [AppTrafficData]) {
    rows.sort_by(|a, b| {
        b.total_bytes
            .cmp(&a.total_bytes)
            .then_with(|| a.app_name.cmp(&b.app_name))
            .then_with(|| a.package_id.cmp(&b.package_id))
    });
}

/// Expand a sparse hour map into exactly 24 ascending buckets.
pub fn fill_hours(hours: &BTreeMap<u32, TransportBytes>) -> Vec<HourlyBucket> {
    if let Some(stray) = hours.keys().find(|&&h| h >= HOURS_PER_DAY) {
        warn!(hour = *stray, "dropping out-of-range hour reported by source");
    }
    (0..HOURS_PER_DAY)
        .map(|hour| match hours.get(&hour) {
            Some(bytes) => HourlyBucket {
                hour,
                mobile_bytes: bytes.mobile_bytes,
                wifi_bytes: bytes.wifi_bytes,
            },
            None => HourlyBucket::empty(hour),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
