use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Accepted `--view` values.
pub const VIEWS: [&str; 3] = ["realtime", "hourly", "report"];

/// Accepted `--refresh-rate` values, in seconds.
pub const REFRESH_RATE_RANGE: RangeInclusive<u32> = 1..=60;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Per-application network traffic monitoring
#[derive(Parser, Debug, Clone)]
#[command(
    name = "traffic-monitor",
    about = "Per-application network traffic monitoring",
    version
)]
pub struct Settings {
    /// Comma-separated day offsets, e.g. "1" or "1,7"
    #[arg(long, default_value = "1")]
    pub days: String,

    /// Show a single calendar day (YYYY-MM-DD) instead of day offsets
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// View mode
    #[arg(long, default_value = "realtime", value_parser = VIEWS)]
    pub view: String,

    /// Package identifier for the per-app hourly chart
    #[arg(long)]
    pub app: Option<String>,

    /// Timezone used for day boundaries (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Refresh rate in seconds (1-60)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=60))]
    pub refresh_rate: u32,

    /// Directory containing JSONL usage records
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Base URL of the report server
    #[arg(long)]
    pub server_url: Option<String>,

    /// Account used to authenticate against the report server
    #[arg(long, env = "TRAFFIC_EMAIL")]
    pub email: Option<String>,

    /// Password for the report server account
    #[arg(long, env = "TRAFFIC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Send the top N applications to the report server
    #[arg(long)]
    pub send_top: Option<usize>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.traffic-monitor/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".traffic-monitor").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear saved configuration");
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; clap keys matches by field name, not flag spelling.
        if !is_arg_explicitly_set(&matches, "days") {
            if let Some(v) = last.days {
                settings.days = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "refresh_rate") {
            match last.refresh_rate {
                Some(v) if REFRESH_RATE_RANGE.contains(&v) => settings.refresh_rate = v,
                Some(v) => {
                    tracing::warn!(refresh_rate = v, "ignoring saved refresh rate out of range")
                }
                None => {}
            }
        }
        if !is_arg_explicitly_set(&matches, "view") {
            match last.view {
                Some(v) if VIEWS.contains(&v.as_str()) => settings.view = v,
                Some(v) => tracing::warn!(view = %v, "ignoring unknown saved view"),
                None => {}
            }
        }
        if settings.server_url.is_none() {
            settings.server_url = last.server_url;
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!(error = %e, "failed to persist last-used parameters");
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            days: Some(s.days.clone()),
            timezone: Some(s.timezone.clone()),
            refresh_rate: Some(s.refresh_rate),
            // A one-shot report run should not become the default view.
            view: (s.view != "report").then(|| s.view.clone()),
            server_url: s.server_url.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            days: Some("1,7".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            refresh_rate: Some(10),
            view: Some("hourly".to_string()),
            server_url: Some("https://example.test".to_string()),
        };

        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded.days, Some("1,7".to_string()));
        assert_eq!(loaded.timezone, Some("Europe/Berlin".to_string()));
        assert_eq!(loaded.refresh_rate, Some(10));
        assert_eq!(loaded.view, Some("hourly".to_string()));
        assert_eq!(loaded.server_url, Some("https://example.test".to_string()));
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);

        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert!(loaded.days.is_none());
        assert!(loaded.timezone.is_none());
        assert!(loaded.refresh_rate.is_none());
        assert!(loaded.view.is_none());
        assert!(loaded.server_url.is_none());
    }

    #[test]
    fn test_last_used_params_default_when_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).days.is_none());
    }

    // ── CLI parsing ───────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["traffic-monitor"]);

        assert_eq!(settings.days, "1");
        assert!(settings.date.is_none());
        assert_eq!(settings.view, "realtime");
        assert!(settings.app.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.refresh_rate, 5);
        assert!(settings.data_path.is_none());
        assert!(settings.send_top.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_cli_date() {
        let settings = Settings::parse_from(["traffic-monitor", "--date", "2024-03-09"]);
        assert_eq!(settings.date, NaiveDate::from_ymd_opt(2024, 3, 9));
    }

    #[test]
    fn test_settings_cli_rejects_bad_date() {
        let result = Settings::try_parse_from(["traffic-monitor", "--date", "09/03/2024"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_cli_refresh_rate_range() {
        assert!(Settings::try_parse_from(["traffic-monitor", "--refresh-rate", "0"]).is_err());
        assert!(Settings::try_parse_from(["traffic-monitor", "--refresh-rate", "61"]).is_err());
    }

    #[test]
    fn test_settings_cli_report_flags() {
        let settings = Settings::parse_from([
            "traffic-monitor",
            "--view",
            "report",
            "--send-top",
            "5",
            "--server-url",
            "https://example.test",
            "--email",
            "me@example.test",
        ]);
        assert_eq!(settings.view, "report");
        assert_eq!(settings.send_top, Some(5));
        assert_eq!(settings.server_url.as_deref(), Some("https://example.test"));
        assert_eq!(settings.email.as_deref(), Some("me@example.test"));
    }

    #[test]
    fn test_from_settings_skips_report_view() {
        let mut settings = Settings::parse_from(["traffic-monitor", "--view", "report"]);
        settings.timezone = "UTC".to_string();
        let last = LastUsedParams::from(&settings);
        assert!(last.view.is_none());
        assert_eq!(last.timezone, Some("UTC".to_string()));
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_days() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            days: Some("7".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-monitor".into()], &config_path);
        assert_eq!(settings.days, "7");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_rejects_bad_refresh_rate() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(&config_path, r#"{"refresh_rate": 0}"#).unwrap();

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-monitor".into()], &config_path);
        assert_eq!(settings.refresh_rate, 5);

        std::fs::write(&config_path, r#"{"refresh_rate": 600}"#).unwrap();
        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-monitor".into()], &config_path);
        assert_eq!(settings.refresh_rate, 5);
    }

    #[test]
    fn test_load_with_last_used_rejects_unknown_view() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            view: Some("monthly".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-monitor".into()], &config_path);
        assert_eq!(settings.view, "realtime");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            days: Some("7".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["traffic-monitor".into(), "--days".into(), "2,3".into()],
            &config_path,
        );
        assert_eq!(settings.days, "2,3");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default()
            .save_to(&config_path)
            .expect("save");

        Settings::load_with_last_used_impl(
            vec!["traffic-monitor".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            vec!["traffic-monitor".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_resolves_auto_timezone() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-monitor".into()], &config_path);
        assert_ne!(settings.timezone, "auto");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "traffic-monitor".into(),
                "--days".into(),
                "3".into(),
                "--server-url".into(),
                "https://example.test".into(),
            ],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.days, Some("3".to_string()));
        assert_eq!(loaded.server_url, Some("https://example.test".to_string()));
    }
}
