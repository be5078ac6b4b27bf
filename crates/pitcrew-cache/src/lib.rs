//! # Pitcrew Cache
//!
//! Short-TTL memoization in front of the expensive maintenance-analytics
//! aggregations. Entries are per (user, kind); reads are lazy-expiring and a
//! periodic sweep bounds memory. Safe for concurrent request handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Default entry lifetime.
pub const DEFAULT_TTL_SECS: i64 = 300;
/// How often the background sweep runs.
pub const SWEEP_INTERVAL_SECS: u64 = 900;

/// What kind of aggregate an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Aggregated maintenance analytics.
    Analytics,
    /// Enriched task list.
    TaskList,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Per-user, per-kind TTL cache.
pub struct AnalyticsCache {
    entries: Mutex<HashMap<(String, CacheKind), CacheEntry>>,
    ttl: Duration,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached value, or `None` on miss/expiry. Expired entries are removed
    /// on the way out.
    pub fn get(&self, user_id: &str, kind: CacheKind) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap();
        let key = (user_id.to_string(), kind);
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a value with a fresh expiry.
    pub fn set(&self, user_id: &str, kind: CacheKind, value: serde_json::Value) {
        let now = Utc::now();
        self.entries.lock().unwrap().insert(
            (user_id.to_string(), kind),
            CacheEntry {
                value,
                fetched_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// When a live entry was computed, for "as of" display. `None` on
    /// miss/expiry.
    pub fn fetched_at(&self, user_id: &str, kind: CacheKind) -> Option<DateTime<Utc>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&(user_id.to_string(), kind))
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.fetched_at)
    }

    /// Drop both kinds for one user. Call after any mutation affecting that
    /// user's tasks.
    pub fn invalidate_user(&self, user_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(user_id.to_string(), CacheKind::Analytics));
        entries.remove(&(user_id.to_string(), CacheKind::TaskList));
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for AnalyticsCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweep loop — run until the task is aborted or the process exits.
pub async fn run_sweeper(cache: Arc<AnalyticsCache>, interval_secs: u64) {
    tracing::info!("cache sweeper started (every {interval_secs}s)");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let removed = cache.sweep();
        if removed > 0 {
            tracing::debug!("cache sweep removed {removed} expired entr(ies)");
        }
    }
}
