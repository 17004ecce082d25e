//! Persistent cache store backed by redb.
//!
//! # Table design
//!
//! A single `ENTRIES` table maps the cache key (`<code>:<sequence_id>` or the
//! kill-switch key) to a JSON-encoded `StoredValue`:
//! ```text
//! { "value": "<payload>", "expires_at_ms": 1752549540000 | null }
//! ```
//!
//! Expiry is enforced on read: an entry whose `expires_at_ms <= now` is
//! invisible to `get`/`keys_matching` and is purged by the next prefix scan.
//! Keys are ordered strings, so a prefix scan is a single range read.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CacheStore;
use crate::error::CacheError;

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default)]
    expires_at_ms: Option<i64>,
}

impl StoredValue {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map_or(true, |at| at > now_ms)
    }
}

fn backend<E: std::fmt::Display>(e: E) -> CacheError {
    CacheError::Backend(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<StoredValue, CacheError> {
    serde_json::from_slice(bytes).map_err(backend)
}

/// Open or create the database at `path` and make sure `ENTRIES` exists.
fn open_db(path: &Path) -> Result<Database, CacheError> {
    let db = Database::create(path).map_err(backend)?;
    let wt = db.begin_write().map_err(backend)?;
    wt.open_table(ENTRIES).map_err(backend)?;
    wt.commit().map_err(backend)?;
    Ok(db)
}

// ---------------------------------------------------------------------------
// RedbCache
// ---------------------------------------------------------------------------

pub struct RedbCache {
    path: PathBuf,
    db: RwLock<Option<Arc<Database>>>,
}

impl RedbCache {
    /// Open the store once, failing immediately if it is unavailable.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let db = open_db(path)?;
        Ok(Self::from_db(path, db))
    }

    /// Open the store, retrying with a fixed delay until it is ready or
    /// `attempts` are spent.
    pub async fn open_with_retry(
        path: &Path,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, CacheError> {
        let attempts = attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let owned = path.to_path_buf();
            let result = tokio::task::spawn_blocking(move || open_db(&owned))
                .await
                .map_err(|e| CacheError::Backend(format!("task join error: {e}")))?;
            match result {
                Ok(db) => {
                    info!(path = %path.display(), attempt, "cache store ready");
                    return Ok(Self::from_db(path, db));
                }
                Err(e) if attempt < attempts => {
                    warn!(path = %path.display(), attempt, error = %e, "cache store not ready, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn from_db(path: &Path, db: Database) -> Self {
        Self {
            path: path.to_path_buf(),
            db: RwLock::new(Some(Arc::new(db))),
        }
    }

    fn handle(&self) -> Result<Arc<Database>, CacheError> {
        let guard = self
            .db
            .read()
            .map_err(|_| CacheError::Backend("cache handle lock poisoned".to_string()))?;
        guard.clone().ok_or(CacheError::Disconnected)
    }

    /// Run a synchronous redb operation off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, CacheError> + Send + 'static,
    {
        let db = self.handle()?;
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| CacheError::Backend(format!("task join error: {e}")))?
    }
}

#[async_trait]
impl CacheStore for RedbCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        self.blocking(move |db| {
            let rt = db.begin_read().map_err(backend)?;
            let table = rt.open_table(ENTRIES).map_err(backend)?;
            let Some(raw) = table.get(key.as_str()).map_err(backend)? else {
                return Ok(None);
            };
            let stored = decode(raw.value())?;
            if stored.is_live(Utc::now().timestamp_millis()) {
                Ok(Some(stored.value))
            } else {
                Ok(None)
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        let key = key.to_string();
        let stored = StoredValue {
            value: value.to_string(),
            expires_at_ms: ttl_secs.map(|s| {
                let ttl_ms = i64::try_from(s).unwrap_or(i64::MAX / 1000).saturating_mul(1000);
                Utc::now().timestamp_millis().saturating_add(ttl_ms)
            }),
        };
        let bytes = serde_json::to_vec(&stored).map_err(backend)?;
        self.blocking(move |db| {
            let wt = db.begin_write().map_err(backend)?;
            {
                let mut table = wt.open_table(ENTRIES).map_err(backend)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(backend)?;
            }
            wt.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn keys_matching(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let prefix = prefix.to_string();
        self.blocking(move |db| {
            let now_ms = Utc::now().timestamp_millis();
            let mut live = Vec::new();
            let mut expired = Vec::new();
            {
                let rt = db.begin_read().map_err(backend)?;
                let table = rt.open_table(ENTRIES).map_err(backend)?;
                for entry in table.range(prefix.as_str()..).map_err(backend)? {
                    let (k, v) = entry.map_err(backend)?;
                    let key = k.value();
                    if !key.starts_with(prefix.as_str()) {
                        break;
                    }
                    match decode(v.value()) {
                        Ok(stored) if !stored.is_live(now_ms) => expired.push(key.to_string()),
                        _ => live.push(key.to_string()),
                    }
                }
            }

            if !expired.is_empty() {
                let wt = db.begin_write().map_err(backend)?;
                {
                    let mut table = wt.open_table(ENTRIES).map_err(backend)?;
                    for key in &expired {
                        table.remove(key.as_str()).map_err(backend)?;
                    }
                }
                wt.commit().map_err(backend)?;
            }

            Ok(live)
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.to_vec();
        self.blocking(move |db| {
            let now_ms = Utc::now().timestamp_millis();
            let mut removed = 0;
            let wt = db.begin_write().map_err(backend)?;
            {
                let mut table = wt.open_table(ENTRIES).map_err(backend)?;
                for key in &keys {
                    if let Some(old) = table.remove(key.as_str()).map_err(backend)? {
                        if decode(old.value()).map_or(true, |s| s.is_live(now_ms)) {
                            removed += 1;
                        }
                    }
                }
            }
            wt.commit().map_err(backend)?;
            Ok(removed)
        })
        .await
    }

    /// Drop the current handle and reopen the file.
    async fn reconnect(&self) -> Result<(), CacheError> {
        {
            let mut guard = self
                .db
                .write()
                .map_err(|_| CacheError::Backend("cache handle lock poisoned".to_string()))?;
            guard.take();
        }
        let path = self.path.clone();
        let db = tokio::task::spawn_blocking(move || open_db(&path))
            .await
            .map_err(|e| CacheError::Backend(format!("task join error: {e}")))??;
        let mut guard = self
            .db
            .write()
            .map_err(|_| CacheError::Backend("cache handle lock poisoned".to_string()))?;
        *guard = Some(Arc::new(db));
        info!(path = %self.path.display(), "cache store reconnected");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
