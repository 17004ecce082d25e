//! Cache store contract and implementations.
//!
//! `CacheStore` is the raw string key/value contract (get, set with TTL,
//! prefix scan, delete). `RecordCache` layers the relay's key layout,
//! JSON encoding, per-operation timeouts and retry-with-reconnect on top.

pub mod memory;
pub mod records;
pub mod redb_store;

pub use memory::MemoryCache;
pub use records::{CacheSnapshot, CachedEntry, RecordCache, RetryPolicy, KILL_SWITCH_KEY};
pub use redb_store::RedbCache;

use crate::error::CacheError;
use async_trait::async_trait;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`. `ttl_secs` of `None` never expires.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError>;

    /// All live keys starting with `prefix`.
    async fn keys_matching(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Remove `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Re-establish the backing connection after a failed operation.
    async fn reconnect(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
