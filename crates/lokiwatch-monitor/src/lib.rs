//! Monitoring core for lokiwatch
//!
//! This crate provides the notification dedup cache, the compiled match
//! pattern, and the poll/sweep loops that drive a query-and-notify cycle.

mod cache;
mod monitor;
mod pattern;

pub use cache::DedupCache;
pub use monitor::{LogSource, Monitor, MonitorConfig, MonitorTasks, Notifier};
pub use pattern::Pattern;

// Re-export types used in our public API
pub use lokiwatch_types::LogLine;
