use super::CacheStrategy;
use crate::error::Result;
use crate::types::CachedEntry;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// In-process cache tier over a key → entry mapping.
///
/// Expiry is checked lazily on every read (an expired entry is dropped
/// and reported as a miss). [`MemoryStrategy::start_sweeper`] adds an
/// optional background task that proactively evicts expired entries so
/// long-idle keys do not pin memory. All operations are O(1) average.
#[derive(Clone, Default)]
pub struct MemoryStrategy {
    data: Arc<RwLock<HashMap<String, CachedEntry>>>,
}

impl MemoryStrategy {
    /// Create an empty memory tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Start a background task that periodically drops expired entries.
    pub fn start_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting memory cache sweeper (interval={:?})", interval);

        let strategy = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                strategy.sweep_expired();
            }
        })
    }

    /// Drop every expired entry. Returns the number of evictions.
    pub fn sweep_expired(&self) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        let evicted = before - data.len();

        if evicted > 0 {
            debug!("Swept {} expired entries", evicted);
        }
        evicted
    }
}

#[async_trait]
impl CacheStrategy for MemoryStrategy {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut data = self.data.write();

        match data.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!("Key expired: {}", key);
                data.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        debug!("SET key={}, size={}, ttl={:?}", key, value.len(), ttl);

        let entry = CachedEntry::new(value, ttl);
        self.data.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("DELETE key={}", key);

        self.data.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut data = self.data.write();
        debug!("CLEAR ({} entries)", data.len());
        data.clear();
        Ok(())
    }
}
