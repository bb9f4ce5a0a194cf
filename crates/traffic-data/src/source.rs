//! The usage-statistics source seam and an in-memory implementation.
//!
//! A [`UsageSource`] is the only way the engine learns about traffic. The
//! platform binding behind it (OS usage statistics, a log directory, a test
//! fixture) is opaque to the aggregator.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use traffic_core::time_utils::TimeRange;
use traffic_core::{ByteCounters, TrafficError, Transport, TransportBytes};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures a usage source may surface to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Usage access has not been granted.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The data could not be read right now.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl From<SourceError> for TrafficError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::PermissionDenied(msg) => TrafficError::PermissionDenied(msg),
            SourceError::Unavailable(msg) => TrafficError::SourceUnavailable(msg),
        }
    }
}

const LAST_HOUR: u32 = 23;

// ── UsageSource ───────────────────────────────────────────────────────────────

/// Supplier of raw per-application byte counters.
///
/// Calls are synchronous and may block; the runtime moves them off the
/// async executor.
pub trait UsageSource: Send + Sync {
    /// Per-package counters for traffic recorded within `range`.
    fn query_byte_counts(
        &self,
        range: TimeRange,
    ) -> Result<BTreeMap<String, ByteCounters>, SourceError>;

    /// Counters for the local calendar day `day`, keyed by whole hours
    /// elapsed since its start and restricted to `package` when given.
    /// Hours without traffic may be absent from the map.
    fn query_hourly(
        &self,
        day: TimeRange,
        package: Option<&str>,
    ) -> Result<BTreeMap<u32, TransportBytes>, SourceError>;

    /// Display name for `package`, if the source knows one.
    fn app_label(&self, _package: &str) -> Option<String> {
        None
    }
}

// ── UsageRecord ───────────────────────────────────────────────────────────────

/// A single traffic sample for one application on one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    pub transport: Transport,
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

/// Sum `records` falling inside `range`, keyed by package.
pub fn counts_in_range<'a>(
    records: impl IntoIterator<Item = &'a UsageRecord>,
    range: TimeRange,
) -> BTreeMap<String, ByteCounters> {
    let mut counts: BTreeMap<String, ByteCounters> = BTreeMap::new();
    for record in records {
        if !range.contains(record.timestamp) {
            continue;
        }
        counts
            .entry(record.package.clone())
            .or_default()
            .add_sample(record.transport, record.rx_bytes, record.tx_bytes);
    }
    counts
}

/// Bucket `records` falling inside `day` by hour elapsed since its start.
///
/// The extra hour of a 25-hour day is folded into the last bucket.
pub fn hourly_in_day<'a>(
    records: impl IntoIterator<Item = &'a UsageRecord>,
    day: TimeRange,
    package: Option<&str>,
) -> BTreeMap<u32, TransportBytes> {
    let mut hours: BTreeMap<u32, TransportBytes> = BTreeMap::new();
    for record in records {
        if !day.contains(record.timestamp) {
            continue;
        }
        if package.is_some_and(|p| p != record.package) {
            continue;
        }
        let Ok(hour) = u32::try_from((record.timestamp - day.start).num_hours()) else {
            continue;
        };
        hours
            .entry(hour.min(LAST_HOUR))
            .or_default()
            .add(record.transport, record.rx_bytes.saturating_add(record.tx_bytes));
    }
    hours
}

// ── MemoryUsageSource ─────────────────────────────────────────────────────────

/// Usage source backed by records held in memory.
///
/// Records can be appended while the source is shared, which makes it
/// suitable for embedding and for driving the refresh loop in tests.
#[derive(Debug, Default)]
pub struct MemoryUsageSource {
    records: RwLock<Vec<UsageRecord>>,
}

impl MemoryUsageSource {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Append one record.
    pub fn record(&self, record: UsageRecord) {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<UsageRecord>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UsageSource for MemoryUsageSource {
    fn query_byte_counts(
        &self,
        range: TimeRange,
    ) -> Result<BTreeMap<String, ByteCounters>, SourceError> {
        Ok(counts_in_range(self.read().iter(), range))
    }

    fn query_hourly(
        &self,
        day: TimeRange,
        package: Option<&str>,
    ) -> Result<BTreeMap<u32, TransportBytes>, SourceError> {
        Ok(hourly_in_day(self.read().iter(), day, package))
    }

    fn app_label(&self, package: &str) -> Option<String> {
        self.read()
            .iter()
            .filter(|r| r.package == package)
            .find_map(|r| r.app_name.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
