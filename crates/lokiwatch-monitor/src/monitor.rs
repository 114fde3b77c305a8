use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use lokiwatch_types::LogLine;

use crate::cache::DedupCache;
use crate::pattern::Pattern;

/// Source of log lines to scan
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch log lines for a query between two instants
    async fn query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LogLine>>;
}

/// Destination for rendered notification messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, text: &str) -> anyhow::Result<()>;
}

/// Tunables for the monitor loops
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Query string passed to the log source each cycle
    pub query: String,

    /// How often a query-and-notify cycle runs; also the query lookback
    pub poll_interval: Duration,

    /// How long a sent notification suppresses duplicates
    pub dedup_window: Duration,

    /// How often expired cache entries are swept out
    pub sweep_interval: Duration,
}

/// Shared state of the monitoring process
///
/// One instance owns the cache, the compiled pattern, and both collaborators,
/// and drives the two background tasks: the poll loop running
/// query-and-notify cycles and the sweep loop bounding cache growth.
pub struct Monitor {
    config: MonitorConfig,
    pattern: Pattern,
    cache: DedupCache,
    source: Arc<dyn LogSource>,
    notifier: Arc<dyn Notifier>,
}

/// Join handles for the two background tasks
pub struct MonitorTasks {
    pub poll: JoinHandle<()>,
    pub sweep: JoinHandle<()>,
}

impl MonitorTasks {
    /// Wait for both tasks to finish
    pub async fn join(self) {
        let _ = self.poll.await;
        let _ = self.sweep.await;
    }
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        pattern: Pattern,
        source: Arc<dyn LogSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache = DedupCache::new(config.dedup_window);
        Self {
            config,
            pattern,
            cache,
            source,
            notifier,
        }
    }

    /// Spawn the poll and sweep tasks; both run until cancelled
    pub fn start(self, cancel: CancellationToken) -> MonitorTasks {
        let monitor = Arc::new(self);
        let poll = tokio::spawn(Arc::clone(&monitor).poll_loop(cancel.clone()));
        let sweep = tokio::spawn(monitor.sweep_loop(cancel));
        MonitorTasks { poll, sweep }
    }

    async fn poll_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.poll_interval);
        // Cycles run inline, so a slow cycle defers later ticks; ticks that
        // back up behind it are dropped, never queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The initial tick completes immediately; consume it so the first
        // cycle waits one full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_cycle().await,
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.cache.sweep();
                    tracing::debug!(removed, cached = self.cache.len(), "swept expired cache entries");
                }
            }
        }
    }

    /// One query-and-notify cycle
    async fn run_cycle(&self) {
        let end = Utc::now();
        let start = end - chrono::Duration::seconds(self.config.poll_interval.as_secs() as i64);

        let lines = match self.source.query(&self.config.query, start, end).await {
            Ok(lines) => lines,
            Err(err) => {
                tracing::error!("log query failed, skipping cycle: {err:#}");
                return;
            }
        };

        let messages: Vec<String> = lines
            .iter()
            .filter(|line| self.pattern.is_match(&line.raw))
            .map(|line| format!("Found pattern in log: {}", line.raw))
            .collect();
        if messages.is_empty() {
            return;
        }

        let mut failed = 0usize;
        for message in &messages {
            if self.cache.contains(message) {
                tracing::info!("skipping duplicate notification: {message}");
                continue;
            }
            match self.notifier.notify(message).await {
                Ok(()) => {
                    self.cache.add(message);
                    tracing::info!("notification sent: {message}");
                }
                Err(err) => {
                    failed += 1;
                    tracing::error!("failed to send notification: {err:#}");
                }
            }
        }
        if failed > 0 {
            tracing::warn!(failed, total = messages.len(), "cycle left notifications undelivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn line(raw: &str) -> LogLine {
        LogLine::new(Utc::now(), raw.to_string())
    }

    fn config(dedup_window: Duration) -> MonitorConfig {
        MonitorConfig {
            query: r#"{job="test"}"#.to_string(),
            poll_interval: Duration::from_secs(60),
            dedup_window,
            sweep_interval: Duration::from_secs(60),
        }
    }

    struct StaticSource {
        lines: Vec<LogLine>,
    }

    #[async_trait]
    impl LogSource for StaticSource {
        async fn query(
            &self,
            _query: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<LogLine>> {
            Ok(self.lines.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl LogSource for FailingSource {
        async fn query(
            &self,
            _query: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<LogLine>> {
            anyhow::bail!("backend unreachable")
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_on: Mutex<Option<String>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }

        fn fail_on(&self, text: &str) {
            *self.fail_on.lock() = Some(text.to_string());
        }

        fn recover(&self) {
            *self.fail_on.lock() = None;
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> anyhow::Result<()> {
            if self.fail_on.lock().as_deref() == Some(text) {
                anyhow::bail!("simulated send failure");
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cycle_sends_only_matching_lines() {
        let source = Arc::new(StaticSource {
            lines: vec![line("critical failure X"), line("all good here")],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            config(Duration::from_secs(60)),
            Pattern::compile("critical").unwrap(),
            source,
            notifier.clone(),
        );

        monitor.run_cycle().await;
        assert_eq!(
            notifier.sent(),
            vec!["Found pattern in log: critical failure X".to_string()]
        );
    }

    #[tokio::test]
    async fn test_duplicate_suppressed_until_window_expires() {
        let source = Arc::new(StaticSource {
            lines: vec![line("critical failure X"), line("all good here")],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            config(Duration::from_millis(100)),
            Pattern::compile("critical").unwrap(),
            source,
            notifier.clone(),
        );

        monitor.run_cycle().await;
        assert_eq!(
            notifier.sent(),
            vec!["Found pattern in log: critical failure X".to_string()]
        );

        // Same line within the window: suppressed
        monitor.run_cycle().await;
        assert_eq!(notifier.sent().len(), 1);

        // After the window lapses the same line notifies again
        tokio::time::sleep(Duration::from_millis(150)).await;
        monitor.run_cycle().await;
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_identical_renderings_share_one_notification() {
        let source = Arc::new(StaticSource {
            lines: vec![line("critical failure X"), line("critical failure X")],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            config(Duration::from_secs(60)),
            Pattern::compile("critical").unwrap(),
            source,
            notifier.clone(),
        );

        monitor.run_cycle().await;
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_message_eligible() {
        let message_a = "Found pattern in log: error in service A";
        let message_b = "Found pattern in log: error in service B";
        let source = Arc::new(StaticSource {
            lines: vec![line("error in service A"), line("error in service B")],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        notifier.fail_on(message_a);
        let monitor = Monitor::new(
            config(Duration::from_secs(60)),
            Pattern::compile("error").unwrap(),
            source,
            notifier.clone(),
        );

        // A fails, B still goes out and only B lands in the cache
        monitor.run_cycle().await;
        assert_eq!(notifier.sent(), vec![message_b.to_string()]);
        assert!(!monitor.cache.contains(message_a));
        assert!(monitor.cache.contains(message_b));

        // Next cycle retries A once the sink recovers; B stays suppressed
        notifier.recover();
        monitor.run_cycle().await;
        assert_eq!(
            notifier.sent(),
            vec![message_b.to_string(), message_a.to_string()]
        );
    }

    #[tokio::test]
    async fn test_query_failure_skips_cycle() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            config(Duration::from_secs(60)),
            Pattern::compile("error").unwrap(),
            Arc::new(FailingSource),
            notifier.clone(),
        );

        monitor.run_cycle().await;
        assert!(notifier.sent().is_empty());
        assert!(monitor.cache.is_empty());
    }

    #[tokio::test]
    async fn test_start_runs_until_cancelled() {
        let source = Arc::new(StaticSource {
            lines: vec![line("critical failure X")],
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            MonitorConfig {
                query: r#"{job="test"}"#.to_string(),
                poll_interval: Duration::from_millis(10),
                dedup_window: Duration::from_millis(1),
                sweep_interval: Duration::from_millis(10),
            },
            Pattern::compile("critical").unwrap(),
            source,
            notifier.clone(),
        );

        let cancel = CancellationToken::new();
        let tasks = monitor.start(cancel.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tasks.join().await;

        assert!(!notifier.sent().is_empty());
    }
}
