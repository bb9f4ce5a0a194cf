//! Plain-text rendering of snapshots and hourly series.

use std::fmt::Write;

use chrono_tz::Tz;
use traffic_core::formatting::{format_kilobytes, share_percent};
use traffic_core::HourlyBucket;
use traffic_runtime::RefreshState;

/// Render the ranked application table with a device total line.
pub fn render_snapshot(state: &RefreshState, tz: Tz) -> String {
    let mut out = String::new();

    let mode = state
        .mode
        .as_ref()
        .map_or_else(|| "idle".to_string(), |m| m.to_string());
    let updated = state.updated_at.map_or_else(
        || "never".to_string(),
        |t| t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    );
    let _ = writeln!(out, "Window: {mode}  (updated {updated})");
    if let Some(kind) = state.last_error {
        let _ = writeln!(out, "Error: {kind}");
    }

    let _ = writeln!(
        out,
        "{:<32} {:>14} {:>14} {:>14} {:>7}",
        "App", "Total", "Mobile", "Wi-Fi", "Share"
    );
    for row in &state.app_data {
        let _ = writeln!(
            out,
            "{:<32} {:>14} {:>14} {:>14} {:>6.1}%",
            truncate(&row.app_name, 32),
            format_kilobytes(row.total_bytes),
            format_kilobytes(row.mobile_bytes),
            format_kilobytes(row.wifi_bytes),
            share_percent(row.total_bytes, state.total.total_bytes),
        );
    }
    let _ = writeln!(
        out,
        "{:<32} {:>14} {:>14} {:>14}",
        "Total",
        format_kilobytes(state.total.total_bytes),
        format_kilobytes(state.total.mobile_bytes),
        format_kilobytes(state.total.wifi_bytes),
    );
    out
}

/// Render 24 hourly buckets, one line each.
pub fn render_hourly(buckets: &[HourlyBucket]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:>14} {:>14} {:>14}", "Hour", "Total", "Mobile", "Wi-Fi");
    for bucket in buckets {
        let _ = writeln!(
            out,
            "{:02}:00  {:>14} {:>14} {:>14}",
            bucket.hour,
            format_kilobytes(bucket.bytes()),
            format_kilobytes(bucket.mobile_bytes),
            format_kilobytes(bucket.wifi_bytes),
        );
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_core::{AppTrafficData, ByteCounters, ErrorKind, TotalTrafficData};

    fn row(pkg: &str, mobile: u64, wifi: u64) -> AppTrafficData {
        let counters = ByteCounters {
            mobile_bytes: mobile,
            wifi_bytes: wifi,
            rx_bytes: mobile + wifi,
            tx_bytes: 0,
        };
        AppTrafficData::from_counters(pkg, pkg, &counters)
    }

    #[test]
    fn test_render_snapshot_lists_rows_and_total() {
        let apps = vec![row("pkgA", 2048, 1024), row("pkgB", 0, 512)];
        let state = RefreshState {
            total: TotalTrafficData::from_rows(&apps),
            app_data: apps,
            ..RefreshState::default()
        };

        let text = render_snapshot(&state, Tz::UTC);
        assert!(text.contains("Window: idle"));
        assert!(text.contains("pkgA"));
        assert!(text.contains("3 Kb"));
        assert!(text.contains("85.7%"));
        assert!(text.lines().last().unwrap().starts_with("Total"));
    }

    #[test]
    fn test_render_snapshot_shows_error() {
        let state = RefreshState {
            last_error: Some(ErrorKind::PermissionDenied),
            ..RefreshState::default()
        };
        let text = render_snapshot(&state, Tz::UTC);
        assert!(text.contains("Error: "));
        assert!(text.contains("updated never"));
    }

    #[test]
    fn test_render_hourly_one_line_per_bucket() {
        let buckets: Vec<HourlyBucket> = (0..24).map(HourlyBucket::empty).collect();
        let text = render_hourly(&buckets);
        assert_eq!(text.lines().count(), 25);
        assert!(text.contains("23:00"));
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5).chars().count(), 5);
    }
}
