use crate::error::Result;
use crate::flight::FlightGroup;
use crate::strategy::CacheStrategy;
use crate::types::CacheStats;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tiering options for a [`CacheStack`].
#[derive(Debug, Clone)]
pub struct StackOptions {
    /// Write an L2 hit back into L1
    pub backfill: bool,
    /// TTL clamp applied to backfilled L1 entries. The strategy
    /// contract carries no remaining-TTL channel, so an unclamped
    /// backfill could outlive the L2 entry it came from; `None` opts
    /// into that explicitly.
    pub backfill_ttl: Option<Duration>,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            backfill: true,
            backfill_ttl: Some(Duration::from_secs(60)),
        }
    }
}

/// Ordered pair of cache tiers with cross-tier read fallback.
///
/// L1 is mandatory and always consulted first; L2, if present, only on
/// an L1 miss. Writes go through to every tier. A tier failure during
/// `get` surfaces to the caller: a dead tier is an error, not a miss.
pub struct CacheStack {
    l1: Arc<dyn CacheStrategy>,
    l2: Option<Arc<dyn CacheStrategy>>,
    options: StackOptions,
    flights: FlightGroup<Vec<u8>>,
    stats: RwLock<CacheStats>,
}

impl CacheStack {
    pub fn new(
        l1: Arc<dyn CacheStrategy>,
        l2: Option<Arc<dyn CacheStrategy>>,
        options: StackOptions,
    ) -> Self {
        Self {
            l1,
            l2,
            options,
            flights: FlightGroup::new(),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Query L1, then L2. An L2 hit is backfilled into L1 when
    /// configured, so subsequent reads skip the slower tier.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.l1.get(key).await? {
            debug!("L1 hit for key={}", key);
            self.stats.write().l1_hits += 1;
            return Ok(Some(value));
        }

        if let Some(l2) = &self.l2 {
            if let Some(value) = l2.get(key).await? {
                debug!("L2 hit for key={}", key);
                self.stats.write().l2_hits += 1;

                if self.options.backfill {
                    match self.l1.set(key, value.clone(), self.options.backfill_ttl).await {
                        Ok(()) => self.stats.write().backfills += 1,
                        // A failed backfill must not discard the value we read
                        Err(e) => warn!("L1 backfill failed for key={}: {}", key, e),
                    }
                }
                return Ok(Some(value));
            }
        }

        self.stats.write().misses += 1;
        Ok(None)
    }

    /// Write through to every tier with the same TTL. Every tier is
    /// attempted even if an earlier one failed; the first failure is
    /// reported afterwards.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.stats.write().sets += 1;

        let l1_result = self.l1.set(key, value.clone(), ttl).await;
        let l2_result = match &self.l2 {
            Some(l2) => l2.set(key, value, ttl).await,
            None => Ok(()),
        };

        l1_result?;
        l2_result
    }

    /// Remove the key from every tier, attempting all before reporting
    /// the first failure.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.stats.write().deletes += 1;

        let l1_result = self.l1.delete(key).await;
        let l2_result = match &self.l2 {
            Some(l2) => l2.delete(key).await,
            None => Ok(()),
        };

        l1_result?;
        l2_result
    }

    /// Drop every entry in every tier, attempting all before reporting
    /// the first failure.
    pub async fn clear(&self) -> Result<()> {
        let l1_result = self.l1.clear().await;
        let l2_result = match &self.l2 {
            Some(l2) => l2.clear().await,
            None => Ok(()),
        };

        l1_result?;
        l2_result
    }

    /// Return the value for `key`, computing it with `loader` on a
    /// stack-wide miss.
    ///
    /// Concurrent callers for the same key converge on one loader
    /// execution: the leader runs `loader`, writes the result through
    /// every tier, and every waiter receives the same value. A loader
    /// failure is delivered to every waiter and nothing is written. A
    /// write-through failure after a successful load surfaces as the
    /// operation's error.
    pub async fn get_or_load<F, Fut>(&self, key: &str, ttl: Option<Duration>, loader: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        self.flights
            .execute(key, || async {
                // Re-check after winning the flight: a previous flight may
                // have filled the key between our miss and this point.
                if let Some(value) = self.get(key).await? {
                    return Ok(value);
                }

                self.stats.write().loads += 1;
                match loader().await {
                    Ok(value) => {
                        self.set(key, value.clone(), ttl).await?;
                        Ok(value)
                    }
                    Err(e) => {
                        self.stats.write().load_failures += 1;
                        debug!("Loader failed for key={}: {}", key, e);
                        Err(e)
                    }
                }
            })
            .await
    }

    /// Snapshot of the stack's counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::strategy::MemoryStrategy;
    use async_trait::async_trait;

    /// Tier that fails every operation, for propagation tests.
    struct BrokenStrategy;

    #[async_trait]
    impl CacheStrategy for BrokenStrategy {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(CacheError::BackendUnavailable("broken tier".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Err(CacheError::BackendUnavailable("broken tier".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(CacheError::BackendUnavailable("broken tier".to_string()))
        }

        async fn clear(&self) -> Result<()> {
            Err(CacheError::BackendUnavailable("broken tier".to_string()))
        }
    }

    fn two_tier() -> (Arc<MemoryStrategy>, Arc<MemoryStrategy>, CacheStack) {
        let l1 = Arc::new(MemoryStrategy::new());
        let l2 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(l1.clone(), Some(l2.clone()), StackOptions::default());
        (l1, l2, stack)
    }

    #[tokio::test]
    async fn test_l1_hit_short_circuits() {
        let (l1, l2, stack) = two_tier();

        l1.set("k", b"from-l1".to_vec(), None).await.unwrap();
        l2.set("k", b"from-l2".to_vec(), None).await.unwrap();

        let value = stack.get("k").await.unwrap();
        assert_eq!(value, Some(b"from-l1".to_vec()));
        assert_eq!(stack.stats().l1_hits, 1);
        assert_eq!(stack.stats().l2_hits, 0);
    }

    #[tokio::test]
    async fn test_l2_hit_backfills_l1() {
        let (l1, _l2, stack) = two_tier();

        // Prime only the second tier
        stack.set("k", b"value".to_vec(), None).await.unwrap();
        l1.delete("k").await.unwrap();

        let value = stack.get("k").await.unwrap();
        assert_eq!(value, Some(b"value".to_vec()));
        assert_eq!(stack.stats().l2_hits, 1);
        assert_eq!(stack.stats().backfills, 1);

        // The backfilled copy now serves from L1
        assert_eq!(l1.get("k").await.unwrap(), Some(b"value".to_vec()));
        let value = stack.get("k").await.unwrap();
        assert_eq!(value, Some(b"value".to_vec()));
        assert_eq!(stack.stats().l1_hits, 1);
    }

    #[tokio::test]
    async fn test_backfill_disabled() {
        let l1 = Arc::new(MemoryStrategy::new());
        let l2 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(
            l1.clone(),
            Some(l2.clone()),
            StackOptions {
                backfill: false,
                backfill_ttl: None,
            },
        );

        l2.set("k", b"value".to_vec(), None).await.unwrap();

        assert_eq!(stack.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(l1.get("k").await.unwrap(), None);
        assert_eq!(stack.stats().backfills, 0);
    }

    #[tokio::test]
    async fn test_miss_at_every_tier() {
        let (_l1, _l2, stack) = two_tier();

        assert_eq!(stack.get("absent").await.unwrap(), None);
        assert_eq!(stack.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_single_tier_stack() {
        let l1 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(l1, None, StackOptions::default());

        stack.set("k", b"value".to_vec(), None).await.unwrap();
        assert_eq!(stack.get("k").await.unwrap(), Some(b"value".to_vec()));

        stack.delete("k").await.unwrap();
        assert_eq!(stack.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_through_reaches_both_tiers() {
        let (l1, l2, stack) = two_tier();

        stack.set("k", b"value".to_vec(), None).await.unwrap();

        assert_eq!(l1.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(l2.get("k").await.unwrap(), Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn test_l1_get_error_surfaces() {
        let l2 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(Arc::new(BrokenStrategy), Some(l2.clone()), StackOptions::default());

        l2.set("k", b"value".to_vec(), None).await.unwrap();

        // Strict policy: a dead L1 is an error, not a fall-through miss
        let result = stack.get("k").await;
        assert!(matches!(result, Err(CacheError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_delete_attempts_l2_despite_l1_failure() {
        let l2 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(Arc::new(BrokenStrategy), Some(l2.clone()), StackOptions::default());

        l2.set("k", b"value".to_vec(), None).await.unwrap();

        let result = stack.delete("k").await;
        assert!(matches!(result, Err(CacheError::BackendUnavailable(_))));
        // The failure was reported, but L2 was still cleaned up
        assert_eq!(l2.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_attempts_l2_despite_l1_failure() {
        let l2 = Arc::new(MemoryStrategy::new());
        let stack = CacheStack::new(Arc::new(BrokenStrategy), Some(l2.clone()), StackOptions::default());

        l2.set("k", b"value".to_vec(), None).await.unwrap();

        assert!(stack.clear().await.is_err());
        assert!(l2.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_load_hit_skips_loader() {
        let (_l1, _l2, stack) = two_tier();

        stack.set("k", b"cached".to_vec(), None).await.unwrap();

        let calls = std::sync::atomic::AtomicUsize::new(0);
        let value = stack
            .get_or_load("k", None, || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(b"loaded".to_vec())
            })
            .await
            .unwrap();
        assert_eq!(value, b"cached".to_vec());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(stack.stats().loads, 0);
    }

    #[tokio::test]
    async fn test_get_or_load_writes_through() {
        let (l1, l2, stack) = two_tier();

        let value = stack
            .get_or_load("k", None, || async { Ok(b"loaded".to_vec()) })
            .await
            .unwrap();
        assert_eq!(value, b"loaded".to_vec());
        assert_eq!(stack.stats().loads, 1);

        assert_eq!(l1.get("k").await.unwrap(), Some(b"loaded".to_vec()));
        assert_eq!(l2.get("k").await.unwrap(), Some(b"loaded".to_vec()));
    }

    #[tokio::test]
    async fn test_get_or_load_failure_writes_nothing() {
        let (l1, l2, stack) = two_tier();

        let result = stack
            .get_or_load("k", None, || async {
                Err(CacheError::loader(anyhow::anyhow!("no upstream")))
            })
            .await;
        assert!(matches!(result, Err(CacheError::Loader(_))));
        assert_eq!(stack.stats().load_failures, 1);

        assert_eq!(l1.get("k").await.unwrap(), None);
        assert_eq!(l2.get("k").await.unwrap(), None);
    }
}
