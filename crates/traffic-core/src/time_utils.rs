//! Calendar-day arithmetic in the user's timezone.
//!
//! Usage windows are aligned to local midnights: "offset N" starts at the
//! midnight N days before today, and an explicit date covers exactly one
//! local calendar day.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone name to a [`Tz`].
///
/// `"auto"` means the system timezone. Unknown names fall back to UTC with a
/// warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name == "auto" {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(timezone = %name, "unrecognised timezone, falling back to UTC");
        Tz::UTC
    })
}

// ── TimeRange ─────────────────────────────────────────────────────────────────

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

// ── Day arithmetic ────────────────────────────────────────────────────────────

/// The local calendar date of `now` in `tz`.
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The UTC instant of local midnight at the start of `date`.
///
/// When midnight does not exist locally (a DST jump at 00:00) the naive
/// midnight is read as UTC instead.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Whole local days between `selected` and today. Negative for future dates.
pub fn days_since(selected: NaiveDate, now: DateTime<Utc>, tz: Tz) -> i64 {
    (local_today(now, tz) - selected).num_days()
}

/// Local midnight starting the day `days_ago` days before today.
///
/// Returns `None` when the date falls outside chrono's calendar range.
pub fn day_start(days_ago: u64, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let date = local_today(now, tz).checked_sub_days(Days::new(days_ago))?;
    Some(start_of_day(date, tz))
}

/// The whole local calendar day `days_ago` days before today, from its
/// midnight to the next one. Spans 23 or 25 hours across DST changes.
pub fn local_day(days_ago: u64, now: DateTime<Utc>, tz: Tz) -> Option<TimeRange> {
    let date = local_today(now, tz).checked_sub_days(Days::new(days_ago))?;
    let next = date.checked_add_days(Days::new(1))?;
    Some(TimeRange {
        start: start_of_day(date, tz),
        end: start_of_day(next, tz),
    })
}

/// Window for a day offset: from local midnight `offset` days ago up to `now`.
///
/// Offset 0 is "today so far".
pub fn day_offset_window(offset: u64, now: DateTime<Utc>, tz: Tz) -> Option<TimeRange> {
    let start = day_start(offset, now, tz)?;
    Some(TimeRange { start, end: now })
}

/// Window covering exactly the local calendar day `days_ago` days before today.
///
/// For today the window ends at `now` rather than the coming midnight.
pub fn single_day_window(days_ago: u64, now: DateTime<Utc>, tz: Tz) -> Option<TimeRange> {
    let day = local_day(days_ago, now, tz)?;
    if days_ago == 0 {
        return Some(TimeRange {
            start: day.start,
            end: now.clamp(day.start, day.end),
        });
    }
    Some(day)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
