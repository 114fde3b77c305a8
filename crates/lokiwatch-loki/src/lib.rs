//! Loki query client for lokiwatch
//!
//! This crate fetches log lines from a Loki backend via the HTTP
//! `query_range` API.

mod client;

pub use client::{LokiClient, LokiError};

// Re-export types that are used in our public API
pub use lokiwatch_types::LogLine;
