use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Stored cache entry: raw value bytes plus an optional absolute expiry.
///
/// An entry with no expiry lives until explicitly deleted or cleared.
/// Expiry is an absolute instant computed at write time; readers check
/// it lazily, so `set` never blocks for the TTL duration.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    /// Raw serialized value
    pub data: Vec<u8>,
    /// Optional expiration time
    pub expires_at: Option<Instant>,
}

impl CachedEntry {
    /// Create a new entry, expiring at `now + ttl` when a TTL is given.
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Check if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| Instant::now() >= expires)
    }
}

/// Statistics for a cache stack.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Number of hits served from the first tier
    pub l1_hits: u64,
    /// Number of hits served from the second tier
    pub l2_hits: u64,
    /// Number of stack-wide misses
    pub misses: u64,
    /// Number of write-through SET operations
    pub sets: u64,
    /// Number of DELETE operations
    pub deletes: u64,
    /// Number of loader executions started by get_or_set
    pub loads: u64,
    /// Number of loader executions that failed
    pub load_failures: u64,
    /// Number of L2 hits written back into L1
    pub backfills: u64,
}

impl CacheStats {
    /// Calculate hit rate across both tiers.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
