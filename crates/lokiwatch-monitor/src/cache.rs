use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

/// Thread-safe cache of recently sent notifications
///
/// Maps a fingerprint (the exact rendered notification text) to the instant
/// it was last successfully sent. A live entry suppresses further
/// notifications for the same fingerprint until it is older than the window.
#[derive(Clone)]
pub struct DedupCache {
    /// Fingerprint -> last successful send
    entries: Arc<RwLock<HashMap<String, Instant>>>,

    /// How long an entry suppresses duplicates
    window: Duration,
}

impl DedupCache {
    /// Create a new cache with the given suppression window
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            window,
        }
    }

    /// Check whether a fingerprint was notified within the window
    ///
    /// An entry that exists but has expired is removed on the way out and
    /// counts as absent.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.contains_at(fingerprint, Instant::now())
    }

    fn contains_at(&self, fingerprint: &str, now: Instant) -> bool {
        let entries = self.entries.upgradable_read();
        match entries.get(fingerprint) {
            Some(seen) if now.duration_since(*seen) < self.window => true,
            Some(_) => {
                // Atomic upgrade: no second caller can observe the stale
                // entry between this check and the removal.
                let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
                entries.remove(fingerprint);
                false
            }
            None => false,
        }
    }

    /// Record a successful notification for a fingerprint
    ///
    /// Resets the timestamp unconditionally. Call only after the downstream
    /// send succeeded, so a failed send stays eligible for retry.
    pub fn add(&self, fingerprint: &str) {
        self.add_at(fingerprint, Instant::now());
    }

    fn add_at(&self, fingerprint: &str, now: Instant) {
        self.entries.write().insert(fingerprint.to_string(), now);
    }

    /// Remove every entry older than the window, returning how many went
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, seen| now.duration_since(*seen) <= self.window);
        before - entries.len()
    }

    /// Number of entries currently held, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
