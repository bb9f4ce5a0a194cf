//! Runtime layer for the traffic monitor.
//!
//! Runs the background [`RefreshLoop`] that keeps the latest aggregation
//! published, and the [`Reporter`] that ships the top applications to a
//! remote server.

pub mod http;
pub mod refresh_loop;
pub mod reporter;

pub use http::HttpReportClient;
pub use refresh_loop::{RefreshHandle, RefreshLoop, RefreshState, DEFAULT_REFRESH_INTERVAL};
pub use reporter::{
    AuthClient, AuthError, AuthToken, Credentials, ReportOutcome, ReportSink, Reporter, SendError,
};
pub use traffic_core as core;
pub use traffic_data as data;
