use super::CacheStore;
use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache. Expired slots are invisible and purged lazily.
#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        match slots.get(key) {
            Some(slot) if slot.is_live(now) => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        let expires_at = ttl_secs.map(|s| Instant::now() + Duration::from_secs(s));
        self.slots.lock().await.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn keys_matching(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        slots.retain(|_, slot| slot.is_live(now));
        let mut keys: Vec<String> = slots
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some(slot) = slots.remove(key) {
                if slot.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
