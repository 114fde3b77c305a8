//! Shared types for lokiwatch
//!
//! This crate contains data structures used across multiple lokiwatch crates.

use chrono::{DateTime, Utc};

/// A single log line returned by the log source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Timestamp assigned by the log backend
    pub timestamp: DateTime<Utc>,

    /// Original raw log line
    pub raw: String,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, raw: String) -> Self {
        Self { timestamp, raw }
    }
}
