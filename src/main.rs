mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use lokiwatch_loki::LokiClient;
use lokiwatch_monitor::{Monitor, MonitorConfig, Pattern};
use lokiwatch_slack::SlackClient;

/// How long a sent notification suppresses duplicates
const DEDUP_WINDOW: Duration = Duration::from_secs(60 * 60);

/// How often expired cache entries are swept out
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Lokiwatch - watches Loki logs for a pattern and notifies a Slack channel
#[derive(Parser, Debug)]
#[command(name = "lokiwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = "lokiwatch.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load(&args.config)?;
    let pattern = Pattern::compile(&config.loki.pattern)
        .with_context(|| format!("invalid match pattern {:?}", config.loki.pattern))?;
    let poll_interval = config::parse_interval(&config.loki.interval)?;

    let source = Arc::new(LokiClient::new(config.loki.endpoint.clone()));
    let notifier = Arc::new(SlackClient::new(
        config.slack.token.clone(),
        config.slack.channel.clone(),
    ));

    tracing::info!(
        pattern = pattern.as_str(),
        interval = ?poll_interval,
        endpoint = %config.loki.endpoint,
        "starting loki pattern monitor"
    );

    let monitor = Monitor::new(
        MonitorConfig {
            query: config.loki.query.clone(),
            poll_interval,
            dedup_window: DEDUP_WINDOW,
            sweep_interval: SWEEP_INTERVAL,
        },
        pattern,
        source,
        notifier,
    );

    let cancel = CancellationToken::new();
    let tasks = monitor.start(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    cancel.cancel();
    tasks.join().await;

    Ok(())
}
