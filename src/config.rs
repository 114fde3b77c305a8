use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Process configuration, merged from defaults, the config file, and
/// environment variables, in that order
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loki: LokiSection,
    pub slack: SlackSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LokiSection {
    pub endpoint: String,
    pub query: String,
    pub pattern: String,
    pub interval: String,
}

impl Default for LokiSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3100".to_string(),
            query: r#"{job="your-job-name"}"#.to_string(),
            pattern: "error|exception|critical".to_string(),
            interval: "1m".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SlackSection {
    pub token: String,
    pub channel: String,
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.slack.token.is_empty() {
            bail!("SLACK_TOKEN is required");
        }
        if self.slack.channel.is_empty() {
            bail!("SLACK_CHANNEL is required");
        }
        Ok(())
    }
}

/// Load configuration; a missing config file is not an error
pub fn load(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    } else {
        Config::default()
    };

    apply_env(&mut config, |name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

fn apply_env<F>(config: &mut Config, get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = get("LOKI_ENDPOINT") {
        config.loki.endpoint = value;
    }
    if let Some(value) = get("LOKI_QUERY") {
        config.loki.query = value;
    }
    if let Some(value) = get("LOKI_PATTERN") {
        config.loki.pattern = value;
    }
    if let Some(value) = get("LOKI_INTERVAL") {
        config.loki.interval = value;
    }
    if let Some(value) = get("SLACK_TOKEN") {
        config.slack.token = value;
    }
    if let Some(value) = get("SLACK_CHANNEL") {
        config.slack.channel = value;
    }
}

/// Parse intervals like `30s`, `5m`, `2h`, or bare seconds
pub fn parse_interval(value: &str) -> Result<Duration> {
    let value = value.trim();
    let seconds = if let Some(number) = value.strip_suffix('s') {
        number.parse::<u64>().ok()
    } else if let Some(number) = value.strip_suffix('m') {
        number.parse::<u64>().ok().map(|n| n * 60)
    } else if let Some(number) = value.strip_suffix('h') {
        number.parse::<u64>().ok().map(|n| n * 3600)
    } else {
        value.parse::<u64>().ok()
    };

    match seconds {
        Some(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => bail!("invalid interval {value:?}, expected forms like 30s, 5m, or 1h"),
    }
}
