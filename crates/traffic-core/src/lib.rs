//! Core types for the traffic monitor.
//!
//! Data model, error taxonomy, query-window validation, calendar-day
//! arithmetic, byte formatting and CLI settings shared by every other crate.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
pub mod window;

pub use error::{ErrorKind, Result, TrafficError};
pub use models::{
    AppTrafficData, ByteCounters, HourlyBucket, TotalTrafficData, Transport, TransportBytes,
};
pub use window::QueryWindow;
