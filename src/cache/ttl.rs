//! In-memory TTL cache shared by every cached fetch
//!
//! Values are stored as JSON so a single cache instance can hold any
//! serializable type. Freshness is checked lazily when an entry is read.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default time-to-live for entries written without a TTL hint (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Errors returned by cache operations
///
/// Reads and writes are total; only pattern invalidation can fail.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The invalidation pattern is not a valid regular expression
    #[error("Invalid invalidation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Which TTL the freshness check applies to an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Each entry expires after the TTL it was written with
    #[default]
    PerEntry,
    /// Every entry expires after the cache default; write hints are
    /// recorded but never consulted
    Global,
}

/// Configuration for a cache instance
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to entries written without a hint
    pub default_ttl: Duration,
    /// How write-time TTL hints affect expiry
    pub ttl_policy: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            ttl_policy: TtlPolicy::default(),
        }
    }
}

/// A single cached value
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached value
    value: serde_json::Value,
    /// Monotonic write time, used for freshness
    stored_at: Instant,
    /// Wall-clock write time, for reporting
    cached_at: DateTime<Utc>,
    /// TTL requested when the entry was written
    ttl: Duration,
}

/// Metadata about a cached entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
    /// Time elapsed since the entry was written
    pub age: Duration,
    /// TTL the freshness check applies to the entry
    pub ttl: Duration,
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently held, fresh or not
    pub size: usize,
    /// Keys currently held, sorted
    pub keys: Vec<String>,
}

/// Key-addressed cache with per-entry expiry
///
/// Construct one instance and share it as `Arc<TtlCache>`. Every operation
/// runs to completion under a single lock and never awaits, so operations
/// never interleave.
#[derive(Debug)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    ttl_policy: TtlPolicy,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl TtlCache {
    /// Creates an empty cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: config.default_ttl,
            ttl_policy: config.ttl_policy,
        }
    }

    /// Creates an empty cache with the given default TTL
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self::new(CacheConfig {
            default_ttl,
            ..CacheConfig::default()
        })
    }

    /// Returns the TTL applied to writes without a hint
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl_policy
    }

    fn effective_ttl(&self, entry: &CacheEntry) -> Duration {
        match self.ttl_policy {
            TtlPolicy::PerEntry => entry.ttl,
            TtlPolicy::Global => self.default_ttl,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) <= self.effective_ttl(entry)
    }

    // No operation leaves the map half-updated, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads a fresh value as JSON
    ///
    /// An expired entry is removed and `None` is returned.
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;

        if self.is_fresh(entry, Instant::now()) {
            debug!(key, "cache hit");
            return Some(entry.value.clone());
        }

        entries.remove(key);
        debug!(key, "cache entry expired");
        None
    }

    /// Reads a fresh value and deserializes it into `T`
    ///
    /// Returns `None` on a miss, on expiry, or when the stored value does
    /// not have the shape of `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Stores a JSON value, replacing any existing entry and restarting its TTL
    pub fn set_value(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            cached_at: Utc::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.lock().insert(key.to_string(), entry);
    }

    /// Serializes and stores a value
    ///
    /// # Arguments
    /// * `key` - Cache key, namespaced by the caller (e.g. "terceros:list")
    /// * `data` - The value to cache
    /// * `ttl` - Expiry for this entry; the cache default when `None`.
    ///   Ignored for freshness under [`TtlPolicy::Global`].
    ///
    /// A value that cannot be represented as JSON is not cached.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        match serde_json::to_value(data) {
            Ok(value) => self.set_value(key, value, ttl),
            Err(e) => warn!(key, error = %e, "value not cached: serialization failed"),
        }
    }

    /// Removes the entry for `key`, if any
    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes every entry whose key satisfies `predicate`
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        let removed = before - entries.len();
        debug!(removed, "invalidated cache entries");
        removed
    }

    /// Removes every entry whose key matches the regular expression `pattern`
    ///
    /// Matching is unanchored; use `^` or `$` to anchor.
    pub fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let re = Regex::new(pattern)?;
        Ok(self.invalidate_matching(|key| re.is_match(key)))
    }

    /// Removes every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.invalidate_matching(|key| key.starts_with(prefix))
    }

    /// Returns the number of entries and their keys
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }

    /// Returns metadata for an entry without checking or affecting freshness
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        Some(EntryInfo {
            cached_at: entry.cached_at,
            age: Instant::now().saturating_duration_since(entry.stored_at),
            ttl: self.effective_ttl(entry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tokio::time::advance;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn test_data(name: &str, value: i32) -> TestData {
        TestData {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let cache = TtlCache::default();

        let result: Option<TestData> = cache.get("nonexistent_key");

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let cache = TtlCache::default();
        let data = test_data("fresh", 100);

        cache.set("fresh_key", &data, None);

        assert_eq!(cache.get::<TestData>("fresh_key"), Some(data));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_fresh_until_ttl_elapses() {
        let cache = TtlCache::with_ttl(Duration::from_secs(60));
        cache.set("k", &1, None);

        advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get::<i32>("k"), Some(1), "Fresh at exactly the TTL");

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get::<i32>("k"), None, "Expired just past the TTL");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_removes_entry() {
        let cache = TtlCache::with_ttl(Duration::from_secs(10));
        cache.set("k", &"v", None);
        assert_eq!(cache.stats().size, 1);

        advance(Duration::from_secs(11)).await;
        assert!(cache.get::<String>("k").is_none());

        assert_eq!(cache.stats().size, 0, "Expired entry should not linger");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_lingers_until_read() {
        let cache = TtlCache::with_ttl(Duration::from_secs(10));
        cache.set("k", &"v", None);

        advance(Duration::from_secs(30)).await;

        // No background sweep
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_restarts_ttl_window() {
        let cache = TtlCache::with_ttl(Duration::from_secs(60));
        cache.set("k", &test_data("first", 1), None);

        advance(Duration::from_secs(45)).await;
        cache.set("k", &test_data("second", 2), None);

        advance(Duration::from_secs(45)).await;
        assert_eq!(
            cache.get::<TestData>("k"),
            Some(test_data("second", 2)),
            "Second write should restart the window"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_hint_is_stored_per_entry() {
        let cache = TtlCache::with_ttl(Duration::from_secs(300));
        cache.set("short", &1, Some(Duration::from_secs(5)));
        cache.set("long", &2, Some(Duration::from_secs(600)));
        cache.set("default", &3, None);

        advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get::<i32>("short"), None);
        assert_eq!(cache.get::<i32>("default"), Some(3));

        advance(Duration::from_secs(300)).await;
        assert_eq!(cache.get::<i32>("default"), None);
        assert_eq!(cache.get::<i32>("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_policy_ignores_ttl_hint() {
        let cache = TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(300),
            ttl_policy: TtlPolicy::Global,
        });
        cache.set("short", &1, Some(Duration::from_secs(5)));
        cache.set("long", &2, Some(Duration::from_secs(600)));

        advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get::<i32>("short"), Some(1), "Hint must not shorten expiry");
        assert_eq!(
            cache.entry_info("short").map(|info| info.ttl),
            Some(Duration::from_secs(300))
        );

        advance(Duration::from_secs(295)).await;
        assert_eq!(cache.get::<i32>("short"), None);
        assert_eq!(cache.get::<i32>("long"), None, "Hint must not extend expiry");
    }

    #[test]
    fn test_default_policy_is_per_entry() {
        assert_eq!(TtlCache::default().ttl_policy(), TtlPolicy::PerEntry);
    }

    #[test]
    fn test_get_with_wrong_type_returns_none_and_keeps_entry() {
        let cache = TtlCache::default();
        cache.set("k", &"not a number", None);

        assert_eq!(cache.get::<i32>("k"), None);
        assert_eq!(cache.get::<String>("k").as_deref(), Some("not a number"));
    }

    #[test]
    fn test_delete_removes_only_that_key() {
        let cache = TtlCache::default();
        cache.set("a", &1, None);
        cache.set("b", &2, None);

        cache.delete("a");
        cache.delete("missing");

        assert_eq!(cache.get::<i32>("a"), None);
        assert_eq!(cache.get::<i32>("b"), Some(2));
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = TtlCache::default();
        cache.set("a", &1, None);
        cache.set("b", &2, None);

        cache.clear();

        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_invalidate_pattern_removes_matching_family() {
        let cache = TtlCache::default();
        cache.set("catalogos:a", &1, None);
        cache.set("catalogos:b", &2, None);
        cache.set("otros:c", &3, None);

        let removed = cache.invalidate_pattern("^catalogos:").unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.stats().keys, vec!["otros:c".to_string()]);
    }

    #[test]
    fn test_invalidate_pattern_is_unanchored() {
        let cache = TtlCache::default();
        cache.set("terceros:list", &1, None);
        cache.set("reports:terceros", &2, None);
        cache.set("catalogos:paises", &3, None);

        let removed = cache.invalidate_pattern("terceros").unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.stats().keys, vec!["catalogos:paises".to_string()]);
    }

    #[test]
    fn test_invalidate_pattern_rejects_invalid_regex() {
        let cache = TtlCache::default();
        cache.set("a", &1, None);

        let result = cache.invalidate_pattern("(unclosed");

        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
        assert_eq!(cache.stats().size, 1, "Nothing removed on error");
    }

    #[test]
    fn test_invalidate_prefix_and_predicate() {
        let cache = TtlCache::default();
        cache.set("terceros:1", &1, None);
        cache.set("terceros:2", &2, None);
        cache.set("catalogos:x", &3, None);

        assert_eq!(cache.invalidate_prefix("terceros:"), 2);
        assert_eq!(cache.invalidate_matching(|k| k.ends_with(":x")), 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_stats_lists_sorted_keys_without_side_effects() {
        let cache = TtlCache::default();
        cache.set("b", &2, None);
        cache.set("a", &1, None);

        let stats = cache.stats();

        assert_eq!(stats.size, 2);
        assert_eq!(stats.keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.stats(), stats);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_info_reports_age_and_ttl() {
        let cache = TtlCache::with_ttl(Duration::from_secs(60));
        let before = Utc::now();
        cache.set("k", &1, Some(Duration::from_secs(10)));

        advance(Duration::from_secs(20)).await;
        let info = cache.entry_info("k").expect("entry_info ignores freshness");

        assert_eq!(info.ttl, Duration::from_secs(10));
        assert_eq!(info.age, Duration::from_secs(20));
        assert!(info.cached_at >= before);
        assert_eq!(cache.stats().size, 1, "entry_info should not evict");
    }
}
