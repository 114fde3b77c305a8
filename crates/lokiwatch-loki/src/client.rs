use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use lokiwatch_monitor::LogSource;
use lokiwatch_types::LogLine;

/// Maximum number of lines requested per query
const QUERY_LIMIT: &str = "1000";

#[derive(Debug, Error)]
pub enum LokiError {
    /// Network-level failure talking to the backend
    #[error("loki request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("loki returned status {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body did not match the query_range wire format
    #[error("failed to decode loki response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Timestamp value was not a nanosecond integer
    #[error("invalid loki timestamp: {0}")]
    Timestamp(String),
}

/// Loki HTTP client wrapper
pub struct LokiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LokiClient {
    /// Create a client for a Loki endpoint such as `http://localhost:3100`
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Fetch raw lines for a LogQL query between two instants
    pub async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogLine>, LokiError> {
        let url = format!(
            "{}/loki/api/v1/query_range",
            self.endpoint.trim_end_matches('/')
        );
        let start_ns = start.timestamp_nanos_opt().unwrap_or_default().to_string();
        let end_ns = end.timestamp_nanos_opt().unwrap_or_default().to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("start", start_ns.as_str()),
                ("end", end_ns.as_str()),
                ("limit", QUERY_LIMIT),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LokiError::Api { status, body });
        }

        let lines = decode_response(&body)?;
        tracing::debug!(lines = lines.len(), "loki query returned");
        Ok(lines)
    }
}

#[async_trait]
impl LogSource for LokiClient {
    async fn query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LogLine>> {
        Ok(self.query_range(query, start, end).await?)
    }
}

#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    data: QueryRangeData,
}

#[derive(Debug, Deserialize)]
struct QueryRangeData {
    result: Vec<LogStream>,
}

#[derive(Debug, Deserialize)]
struct LogStream {
    /// Entries are `[nanosecond timestamp, line]` pairs
    values: Vec<(String, String)>,
}

/// Flatten a query_range body into log lines, keeping response order
fn decode_response(body: &str) -> Result<Vec<LogLine>, LokiError> {
    let decoded: QueryRangeResponse = serde_json::from_str(body)?;

    let mut lines = Vec::new();
    for stream in decoded.data.result {
        for (timestamp, raw) in stream.values {
            let ns: i64 = timestamp
                .parse()
                .map_err(|_| LokiError::Timestamp(timestamp.clone()))?;
            lines.push(LogLine::new(DateTime::from_timestamp_nanos(ns), raw));
        }
    }
    Ok(lines)
}
