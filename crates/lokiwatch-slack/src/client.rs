use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use lokiwatch_monitor::Notifier;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    /// Network-level failure talking to the API
    #[error("slack request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("slack returned status {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// API accepted the request but rejected the message (`ok: false`)
    #[error("slack rejected message: {0}")]
    Rejected(String),
}

/// Slack web API client posting to a single channel
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    channel: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(token: String, channel: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            channel,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base URL, for tests and proxies
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    fn build_url(&self, method: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            method.trim_start_matches('/')
        )
    }

    /// Post one message to the configured channel
    pub async fn post_message(&self, text: &str) -> Result<(), SlackError> {
        let payload = json!({
            "channel": self.channel,
            "text": text,
        });

        let response = self
            .http
            .post(self.build_url("chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SlackError::Api { status, body });
        }

        // Slack reports application errors as 200 with ok=false
        let raw: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let ok = raw.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        if !ok {
            let error = raw
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return Err(SlackError::Rejected(error.to_string()));
        }

        tracing::debug!(channel = %self.channel, "slack message posted");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        Ok(self.post_message(text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_joins_cleanly() {
        let client = SlackClient::new("token".into(), "C123".into());
        assert_eq!(
            client.build_url("chat.postMessage"),
            "https://slack.com/api/chat.postMessage"
        );

        let proxied = SlackClient::new("token".into(), "C123".into())
            .with_api_base("https://proxy.example.com/api/".into());
        assert_eq!(
            proxied.build_url("/chat.postMessage"),
            "https://proxy.example.com/api/chat.postMessage"
        );
    }
}
