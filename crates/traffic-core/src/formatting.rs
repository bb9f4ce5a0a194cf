/// Format an integer with thousands separators.
///
/// # Examples
///
/// ```
/// use traffic_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a byte count as whole kilobytes (`bytes / 1024`, truncated).
///
/// # Examples
///
/// ```
/// use traffic_core::formatting::format_kilobytes;
///
/// assert_eq!(format_kilobytes(3584), "3 Kb");
/// assert_eq!(format_kilobytes(5_242_880), "5,120 Kb");
/// ```
pub fn format_kilobytes(bytes: u64) -> String {
    format!("{} Kb", format_count(bytes / 1024))
}

/// Share of `part` in `whole` as a percentage with one decimal.
///
/// Returns `0.0` if `whole` is zero.
pub fn share_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i != 0 && i % 3 == remainder {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_count ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_count_small() {
        assert_eq!(format_count(5), "5");
        assert_eq!(format_count(999), "999");
    }

    #[test]
    fn test_format_count_thousands() {
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(12_345), "12,345");
    }

    #[test]
    fn test_format_count_max() {
        assert_eq!(format_count(u64::MAX), "18,446,744,073,709,551,615");
    }

    // ── format_kilobytes ─────────────────────────────────────────────────────

    #[test]
    fn test_format_kilobytes_truncates() {
        assert_eq!(format_kilobytes(0), "0 Kb");
        assert_eq!(format_kilobytes(1023), "0 Kb");
        assert_eq!(format_kilobytes(1024), "1 Kb");
        assert_eq!(format_kilobytes(3072), "3 Kb");
    }

    // ── share_percent ────────────────────────────────────────────────────────

    #[test]
    fn test_share_percent() {
        assert!((share_percent(1, 4) - 25.0).abs() < 1e-9);
        assert!((share_percent(1, 3) - 33.3).abs() < 1e-9);
    }

    #[test]
    fn test_share_percent_zero_whole() {
        assert_eq!(share_percent(10, 0), 0.0);
    }
}
