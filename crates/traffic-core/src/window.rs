//! Query windows and their validation rules.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// What period an aggregation pass covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum QueryWindow {
    /// Union of "last N days" windows. Duplicates collapse.
    DayOffsets(BTreeSet<i64>),
    /// One calendar day, re-resolved to a days-ago count on every evaluation.
    ExplicitDate(NaiveDate),
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DayOffsets(offsets) => {
                let list: Vec<String> = offsets.iter().map(|o| o.to_string()).collect();
                write!(f, "days {}", list.join(","))
            }
            Self::ExplicitDate(date) => write!(f, "date {}", date.format("%Y-%m-%d")),
        }
    }
}

/// Parse comma-separated day offsets such as `"1, 7,30"`.
///
/// Tokens that are not integers are skipped. Fails with
/// [`TrafficError::InvalidWindow`] when nothing parses or an offset is
/// negative.
pub fn parse_day_offsets(text: &str) -> Result<BTreeSet<i64>> {
    let offsets: BTreeSet<i64> = text
        .split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .collect();
    widest_offset(&offsets)?;
    Ok(offsets)
}

/// Validate a day-offset set and return the largest offset.
///
/// The union of "last N days" windows is the window of the largest N.
pub fn widest_offset(offsets: &BTreeSet<i64>) -> Result<u64> {
    let Some(&first) = offsets.first() else {
        return Err(TrafficError::invalid_window("no day offsets given"));
    };
    if first < 0 {
        return Err(TrafficError::invalid_window(format!(
            "day offset {first} is negative"
        )));
    }
    let widest = offsets.last().copied().unwrap_or(first);
    u64::try_from(widest).map_err(|_| TrafficError::invalid_window("day offset out of range"))
}

/// Validate a days-ago count for a fixed-day query.
pub fn checked_days_ago(days_ago: i64) -> Result<u64> {
    u64::try_from(days_ago).map_err(|_| {
        TrafficError::invalid_window(format!("date is {} day(s) in the future", -days_ago))
    })
}
