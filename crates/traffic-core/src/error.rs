use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by the traffic aggregation engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrafficError {
    /// The requested day window is empty, unparseable, negative or in the future.
    #[error("Invalid query window: {0}")]
    InvalidWindow(String),

    /// The usage-statistics source refused access.
    #[error("Usage access denied: {0}")]
    PermissionDenied(String),

    /// The usage-statistics source could not be queried.
    #[error("Usage source unavailable: {0}")]
    SourceUnavailable(String),
}

impl TrafficError {
    /// Shorthand for building an [`TrafficError::InvalidWindow`].
    pub fn invalid_window(reason: impl Into<String>) -> Self {
        Self::InvalidWindow(reason.into())
    }

    /// The coarse category stored in published snapshots.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWindow(_) => ErrorKind::InvalidWindow,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
        }
    }
}

/// Error category folded into a refresh snapshot instead of being raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidWindow,
    PermissionDenied,
    SourceUnavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InvalidWindow => "invalid number of days",
            Self::PermissionDenied => "usage access permission required",
            Self::SourceUnavailable => "usage data unavailable",
        };
        f.write_str(label)
    }
}

/// Convenience alias used throughout the traffic crates.
pub type Result<T> = std::result::Result<T, TrafficError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_window() {
        let err = TrafficError::invalid_window("no day offsets given");
        assert_eq!(err.to_string(), "Invalid query window: no day offsets given");
    }

    #[test]
    fn test_error_display_permission_denied() {
        let err = TrafficError::PermissionDenied("usage stats".to_string());
        assert_eq!(err.to_string(), "Usage access denied: usage stats");
    }

    #[test]
    fn test_error_display_source_unavailable() {
        let err = TrafficError::SourceUnavailable("/missing/dir".to_string());
        assert_eq!(err.to_string(), "Usage source unavailable: /missing/dir");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            TrafficError::invalid_window("x").kind(),
            ErrorKind::InvalidWindow
        );
        assert_eq!(
            TrafficError::PermissionDenied("x".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            TrafficError::SourceUnavailable("x".into()).kind(),
            ErrorKind::SourceUnavailable
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SourceUnavailable).unwrap();
        assert_eq!(json, "\"source_unavailable\"");
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InvalidWindow.to_string(), "invalid number of days");
    }
}
