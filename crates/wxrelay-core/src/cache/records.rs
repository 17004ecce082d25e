//! Record-level view of the cache.
//!
//! Key layout:
//! - `<code>:<sequence_id>` holds the last dispatched [`TrackedRecord`] for a
//!   code as JSON. A successful commit leaves exactly one such key per code.
//! - [`KILL_SWITCH_KEY`] holds `true` while execution is disabled.
//!
//! Every store call goes through [`RecordCache::with_retry`], which bounds the
//! call with a timeout, reconnects between attempts and reports
//! `RelayError::CacheUnavailable` once the attempts are spent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::CacheStore;
use crate::clock;
use crate::config::CacheConfig;
use crate::error::{CacheError, RelayError, Result};
use crate::types::{JobKind, TrackedRecord};

pub const KILL_SWITCH_KEY: &str = "disableExecute";

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub op_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self {
            attempts: cfg.retry_attempts.max(1),
            delay: cfg.retry_delay(),
            op_timeout: cfg.op_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CachedEntry {
    pub key: String,
    pub job: JobKind,
    pub record: TrackedRecord,
}

/// Everything the operator "read all cache state" view shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheSnapshot {
    pub execution_disabled: bool,
    pub entries: Vec<CachedEntry>,
    /// Keys whose value could not be decoded as a record.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<String>,
}

// ---------------------------------------------------------------------------
// RecordCache
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RecordCache {
    store: Arc<dyn CacheStore>,
    policy: RetryPolicy,
}

fn code_prefix(code: &str) -> String {
    format!("{code}:")
}

fn record_key(record: &TrackedRecord) -> String {
    format!("{}:{}", record.code, record.sequence_id)
}

impl RecordCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one store operation under the timeout/retry/reconnect policy.
    async fn with_retry<'s, T, F, Fut>(&'s self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut(&'s dyn CacheStore) -> Fut,
        Fut: Future<Output = std::result::Result<T, CacheError>>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.policy.op_timeout, call(self.store.as_ref())).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Timeout(self.policy.op_timeout)),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(op, attempt, attempts, error = %e, "cache operation failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                        if let Err(e) = self.store.reconnect().await {
                            warn!(op, error = %e, "cache reconnect failed");
                        }
                    }
                }
            }
        }
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(RelayError::CacheUnavailable(format!(
            "{op} failed after {attempts} attempt(s): {reason}"
        )))
    }

    // -----------------------------------------------------------------------
    // Kill switch
    // -----------------------------------------------------------------------

    pub async fn is_disabled(&self) -> Result<bool> {
        let value = self
            .with_retry("read kill switch", |s| s.get(KILL_SWITCH_KEY))
            .await?;
        Ok(value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
    }

    pub async fn set_disabled(&self, disabled: bool) -> Result<()> {
        if disabled {
            self.with_retry("set kill switch", |s| s.set(KILL_SWITCH_KEY, "true", None))
                .await
        } else {
            let keys = [KILL_SWITCH_KEY.to_string()];
            let keys = keys.as_slice();
            self.with_retry("clear kill switch", |s| s.delete(keys))
                .await
                .map(|_| ())
        }
    }

    // -----------------------------------------------------------------------
    // Per-code records
    // -----------------------------------------------------------------------

    /// All live keys for `code`, with their decoded records (`None` when the
    /// stored JSON does not decode).
    async fn entries_for(&self, code: &str) -> Result<Vec<(String, Option<TrackedRecord>)>> {
        let prefix = code_prefix(code);
        let prefix = prefix.as_str();
        let keys = self
            .with_retry("list keys", |s| s.keys_matching(prefix))
            .await?;

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let key_ref = key.as_str();
            let Some(raw) = self.with_retry("read entry", |s| s.get(key_ref)).await? else {
                continue;
            };
            let record = match serde_json::from_str::<TrackedRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "ignoring undecodable cache entry");
                    None
                }
            };
            out.push((key, record));
        }
        Ok(out)
    }

    /// The most recent cached record for `code`, newest by `creation_time`.
    /// Entries without a parsable creation time rank oldest.
    pub async fn recent_entry(&self, code: &str) -> Result<Option<TrackedRecord>> {
        let records = self.entries_for(code).await?;
        // Every entry shares the source offset, so UTC parsing orders them correctly.
        let utc = clock::source_offset(0);
        let newest = records
            .into_iter()
            .filter_map(|(_, record)| record)
            .max_by_key(|r| {
                let created = r
                    .creation_time
                    .as_deref()
                    .and_then(|t| clock::parse_any(t, utc));
                (created, r.sequence_id)
            });
        Ok(newest)
    }

    /// Replace every entry of the record's code with the record itself.
    ///
    /// The new key is written before stale keys are removed, so a failed
    /// write leaves the previous entry in place. `None` stores without
    /// expiry; a TTL that has already run out is clamped to one second.
    pub async fn commit(&self, record: &TrackedRecord, ttl_secs: Option<i64>) -> Result<()> {
        let key = record_key(record);
        let value = serde_json::to_string(record)?;
        let ttl = ttl_secs.map(|s| u64::try_from(s).unwrap_or(0).max(1));
        let (key_ref, value_ref) = (key.as_str(), value.as_str());
        self.with_retry("write entry", |s| s.set(key_ref, value_ref, ttl))
            .await?;

        let prefix = code_prefix(&record.code);
        let prefix = prefix.as_str();
        let mut stale = self
            .with_retry("list keys", |s| s.keys_matching(prefix))
            .await?;
        stale.retain(|k| *k != key);
        if !stale.is_empty() {
            let stale = stale.as_slice();
            self.with_retry("delete stale entries", |s| s.delete(stale))
                .await?;
        }
        debug!(key = %key, ttl = ?ttl, "cache entry committed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Administrative views
    // -----------------------------------------------------------------------

    /// Every cached entry for `codes`, in code order.
    pub async fn entries(
        &self,
        job: JobKind,
        codes: &[String],
        snapshot: &mut CacheSnapshot,
    ) -> Result<()> {
        for code in codes {
            for (key, record) in self.entries_for(code).await? {
                match record {
                    Some(record) => snapshot.entries.push(CachedEntry { key, job, record }),
                    None => snapshot.unreadable.push(key),
                }
            }
        }
        Ok(())
    }

    /// Delete every entry for `codes`. The kill switch is never touched.
    pub async fn clear(&self, codes: &[String]) -> Result<u64> {
        let mut keys = Vec::new();
        for code in codes {
            let prefix = code_prefix(code);
            let prefix = prefix.as_str();
            keys.extend(
                self.with_retry("list keys", |s| s.keys_matching(prefix))
                    .await?,
            );
        }
        keys.retain(|k| k != KILL_SWITCH_KEY);
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.as_slice();
        self.with_retry("clear entries", |s| s.delete(keys)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
            op_timeout: Duration::from_millis(200),
        }
    }

    fn memory() -> (Arc<MemoryCache>, RecordCache) {
        let store = Arc::new(MemoryCache::new());
        let cache = RecordCache::new(store.clone(), fast_policy());
        (store, cache)
    }

    fn record(code: &str, seq: u64, created: &str) -> TrackedRecord {
        let mut r = TrackedRecord::new(code, seq);
        r.creation_time = Some(created.to_string());
        r
    }

    #[tokio::test]
    async fn commit_replaces_all_keys_of_code() {
        let (store, cache) = memory();
        cache
            .commit(&record("wts", 7, "2025-07-24 06:00:00.0"), Some(600))
            .await
            .unwrap();
        cache
            .commit(&record("wts", 8, "2025-07-24 07:00:00.0"), Some(600))
            .await
            .unwrap();

        assert_eq!(store.keys_matching("wts:").await.unwrap(), vec!["wts:8".to_string()]);
        let recent = cache.recent_entry("wts").await.unwrap().unwrap();
        assert_eq!(recent.sequence_id, 8);
    }

    #[tokio::test]
    async fn recent_entry_picks_newest_creation_time() {
        let (store, cache) = memory();
        let older = record("tc8ne", 30, "2025-07-24 06:00:00.0");
        let newer = record("tc8ne", 12, "2025-07-24 09:30:00.0");
        let garbage = record("tc8ne", 99, "yesterday");
        for r in [&older, &newer, &garbage] {
            store
                .set(&record_key(r), &serde_json::to_string(r).unwrap(), None)
                .await
                .unwrap();
        }
        store.set("tc8ne:1", "{not json", None).await.unwrap();

        let recent = cache.recent_entry("tc8ne").await.unwrap().unwrap();
        assert_eq!(recent.sequence_id, 12);
        assert!(cache.recent_entry("tc9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_ttl_stores_without_expiry() {
        let (store, cache) = memory();
        cache.commit(&TrackedRecord::new("wl", 1), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.get("wl:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn elapsed_ttl_expires_after_one_second() {
        let (store, cache) = memory();
        cache.commit(&TrackedRecord::new("wl", 1), Some(-5)).await.unwrap();
        assert!(store.get("wl:1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.get("wl:1").await.unwrap().is_none());
    }

    /// Memory store whose writes always fail.
    struct ReadOnlyStore(MemoryCache);

    #[async_trait]
    impl CacheStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
            self.0.get(key).await
        }
        async fn set(&self, _: &str, _: &str, _: Option<u64>) -> std::result::Result<(), CacheError> {
            Err(CacheError::Backend("read-only".into()))
        }
        async fn keys_matching(&self, prefix: &str) -> std::result::Result<Vec<String>, CacheError> {
            self.0.keys_matching(prefix).await
        }
        async fn delete(&self, keys: &[String]) -> std::result::Result<u64, CacheError> {
            self.0.delete(keys).await
        }
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_entry() {
        let inner = MemoryCache::new();
        let previous = TrackedRecord::new("A", 7);
        inner
            .set("A:7", &serde_json::to_string(&previous).unwrap(), None)
            .await
            .unwrap();
        let store = Arc::new(ReadOnlyStore(inner));
        let cache = RecordCache::new(store.clone(), fast_policy());

        let err = cache.commit(&TrackedRecord::new("A", 8), None).await.unwrap_err();
        assert!(matches!(err, RelayError::CacheUnavailable(_)), "{err}");
        assert_eq!(store.keys_matching("A:").await.unwrap(), vec!["A:7".to_string()]);
    }

    #[tokio::test]
    async fn recommitting_same_key_keeps_it() {
        let (store, cache) = memory();
        let r = record("wts", 7, "2025-07-24 06:00:00.0");
        cache.commit(&r, None).await.unwrap();
        cache.commit(&r, None).await.unwrap();
        assert_eq!(store.keys_matching("wts:").await.unwrap(), vec!["wts:7".to_string()]);
    }

    #[tokio::test]
    async fn kill_switch_roundtrip() {
        let (store, cache) = memory();
        assert!(!cache.is_disabled().await.unwrap());
        cache.set_disabled(true).await.unwrap();
        assert!(cache.is_disabled().await.unwrap());
        assert_eq!(store.get(KILL_SWITCH_KEY).await.unwrap().as_deref(), Some("true"));
        cache.set_disabled(false).await.unwrap();
        assert!(!cache.is_disabled().await.unwrap());
    }

    #[tokio::test]
    async fn clear_is_scoped_to_codes_and_keeps_kill_switch() {
        let (store, cache) = memory();
        cache.set_disabled(true).await.unwrap();
        cache.commit(&TrackedRecord::new("wts", 1), None).await.unwrap();
        cache.commit(&TrackedRecord::new("MHEAD_C", 2), None).await.unwrap();

        let removed = cache.clear(&["wts".to_string(), "wl".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("MHEAD_C:2").await.unwrap().is_some());
        assert!(cache.is_disabled().await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_separates_unreadable_keys() {
        let (store, cache) = memory();
        cache.commit(&TrackedRecord::new("wts", 3), None).await.unwrap();
        store.set("wl:4", "garbage", None).await.unwrap();

        let mut snapshot = CacheSnapshot::default();
        cache
            .entries(JobKind::Signals, &["wts".to_string(), "wl".to_string()], &mut snapshot)
            .await
            .unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].key, "wts:3");
        assert_eq!(snapshot.unreadable, vec!["wl:4".to_string()]);
    }

    /// Fails every call until `heal_after` reconnects have happened.
    struct FlakyStore {
        inner: MemoryCache,
        reconnects: AtomicU32,
        heal_after: u32,
    }

    impl FlakyStore {
        fn check(&self) -> std::result::Result<(), CacheError> {
            if self.reconnects.load(Ordering::SeqCst) >= self.heal_after {
                Ok(())
            } else {
                Err(CacheError::Disconnected)
            }
        }
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl_secs: Option<u64>,
        ) -> std::result::Result<(), CacheError> {
            self.check()?;
            self.inner.set(key, value, ttl_secs).await
        }
        async fn keys_matching(&self, prefix: &str) -> std::result::Result<Vec<String>, CacheError> {
            self.check()?;
            self.inner.keys_matching(prefix).await
        }
        async fn delete(&self, keys: &[String]) -> std::result::Result<u64, CacheError> {
            self.check()?;
            self.inner.delete(keys).await
        }
        async fn reconnect(&self) -> std::result::Result<(), CacheError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn retry_recovers_after_reconnect() {
        let store = Arc::new(FlakyStore {
            inner: MemoryCache::new(),
            reconnects: AtomicU32::new(0),
            heal_after: 2,
        });
        let cache = RecordCache::new(store.clone(), fast_policy());
        assert!(!cache.is_disabled().await.unwrap());
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_exhaustion_is_cache_unavailable() {
        let store = Arc::new(FlakyStore {
            inner: MemoryCache::new(),
            reconnects: AtomicU32::new(0),
            heal_after: u32::MAX,
        });
        let cache = RecordCache::new(store.clone(), fast_policy());
        let err = cache.recent_entry("wts").await.unwrap_err();
        assert!(matches!(err, RelayError::CacheUnavailable(_)), "{err}");
        // No reconnect after the final attempt.
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 2);
    }

    struct StallingStore;

    #[async_trait]
    impl CacheStore for StallingStore {
        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn set(&self, _: &str, _: &str, _: Option<u64>) -> std::result::Result<(), CacheError> {
            Ok(())
        }
        async fn keys_matching(&self, _: &str) -> std::result::Result<Vec<String>, CacheError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _: &[String]) -> std::result::Result<u64, CacheError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn stalled_operation_times_out() {
        let policy = RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(1),
            op_timeout: Duration::from_millis(20),
        };
        let cache = RecordCache::new(Arc::new(StallingStore), policy);
        let err = cache.is_disabled().await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
