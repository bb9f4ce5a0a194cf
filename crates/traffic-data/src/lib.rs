//! Data layer for the traffic monitor.
//!
//! Defines the [`UsageSource`] seam, bundles an in-memory and a JSONL-backed
//! source, and turns raw counters into ranked summaries via [`Aggregator`].

pub mod aggregator;
pub mod jsonl;
pub mod source;

pub use aggregator::{Aggregation, Aggregator};
pub use jsonl::JsonlUsageSource;
pub use source::{MemoryUsageSource, SourceError, UsageRecord, UsageSource};
pub use traffic_core as core;
