//! JSONL file discovery and loading.
//!
//! Reads traffic samples exported as one JSON object per line from every
//! `*.jsonl` file below a directory and serves them through [`UsageSource`].
//! Files are re-read on every query, so the source always reflects what is
//! on disk right now.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};
use traffic_core::time_utils::TimeRange;
use traffic_core::{ByteCounters, TransportBytes};

use crate::source::{counts_in_range, hourly_in_day, SourceError, UsageRecord, UsageSource};

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.jsonl` files recursively under `data_path`, sorted by path.
///
/// A directory that cannot be listed because of missing permissions is an
/// error; other unreadable entries are skipped.
pub fn find_jsonl_files(data_path: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if !data_path.exists() {
        return Err(SourceError::Unavailable(format!(
            "data path does not exist: {}",
            data_path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(data_path).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if is_permission_denied(e.io_error()) {
                    return Err(SourceError::PermissionDenied(e.to_string()));
                }
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let is_jsonl = entry.path().extension().is_some_and(|ext| ext == "jsonl");
        if entry.file_type().is_file() && is_jsonl {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Usage source reading JSONL traffic records from a directory tree.
///
/// Each line looks like
/// `{"timestamp":"2024-01-15T08:00:00Z","package":"com.example","appName":"Example","transport":"wifi","rxBytes":1024,"txBytes":512}`.
#[derive(Debug)]
pub struct JsonlUsageSource {
    root: PathBuf,
    /// Display names seen during the most recent load.
    labels: RwLock<HashMap<String, String>>,
}

impl JsonlUsageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            labels: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every record whose timestamp falls inside `range`.
    pub fn load_records(&self, range: TimeRange) -> Result<Vec<UsageRecord>, SourceError> {
        let files = find_jsonl_files(&self.root)?;
        if files.is_empty() {
            debug!(path = %self.root.display(), "no JSONL files found");
        }

        let mut records = Vec::new();
        let mut labels = HashMap::new();
        for file_path in &files {
            for record in process_single_file(file_path)? {
                if let Some(name) = &record.app_name {
                    labels.insert(record.package.clone(), name.clone());
                }
                if range.contains(record.timestamp) {
                    records.push(record);
                }
            }
        }

        *self
            .labels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = labels;

        debug!(
            files = files.len(),
            records = records.len(),
            "loaded usage records"
        );
        Ok(records)
    }
}

impl UsageSource for JsonlUsageSource {
    fn query_byte_counts(
        &self,
        range: TimeRange,
    ) -> Result<BTreeMap<String, ByteCounters>, SourceError> {
        let records = self.load_records(range)?;
        Ok(counts_in_range(&records, range))
    }

    fn query_hourly(
        &self,
        day: TimeRange,
        package: Option<&str>,
    ) -> Result<BTreeMap<u32, TransportBytes>, SourceError> {
        let records = self.load_records(day)?;
        Ok(hourly_in_day(&records, day, package))
    }

    fn app_label(&self, package: &str) -> Option<String> {
        self.labels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(package)
            .cloned()
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_permission_denied(err: Option<&std::io::Error>) -> bool {
    err.is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
}

/// Parse one JSONL file. Malformed lines are skipped.
fn process_single_file(file_path: &Path) -> Result<Vec<UsageRecord>, SourceError> {
    let file = match std::fs::File::open(file_path) {
        Ok(f) => f,
        Err(e) if is_permission_denied(Some(&e)) => {
            return Err(SourceError::PermissionDenied(format!(
                "{}: {}",
                file_path.display(),
                e
            )));
        }
        Err(e) => {
            warn!("Failed to read file {}: {}", file_path.display(), e);
            return Ok(Vec::new());
        }
    };

    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    let mut skipped = 0u64;

    for line_result in reader.lines() {
        let Ok(line) = line_result else {
            skipped += 1;
            continue;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<UsageRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                debug!(
                    "Failed to parse JSON line in {}: {}",
                    file_path.display(),
                    e
                );
            }
        }
    }

    debug!(
        "File {}: {} parsed, {} skipped",
        file_path.display(),
        records.len(),
        skipped,
    );

    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
