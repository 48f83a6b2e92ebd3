use crate::cache::Cache;
use crate::config::{CacheConfig, TierConfig};
use crate::error::Result;
use crate::stack::{CacheStack, StackOptions};
use crate::strategy::{CacheStrategy, DiskConfig, DiskStrategy, MemoryStrategy};
use crate::types::CacheStats;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Owner of the configured cache stack and factory for namespaced views.
///
/// There is no process-wide instance: the application constructs a
/// registry at startup and passes it (or clones of its views) to every
/// collaborator that caches. All views share the same stack, including
/// its single-flight registry, so callers racing on the same key
/// coalesce regardless of which view they hold.
pub struct CacheRegistry {
    stack: Arc<CacheStack>,
    sweepers: Vec<tokio::task::JoinHandle<()>>,
}

impl CacheRegistry {
    /// Assemble a registry from explicit tier instances.
    pub fn new(
        l1: Arc<dyn CacheStrategy>,
        l2: Option<Arc<dyn CacheStrategy>>,
        options: StackOptions,
    ) -> Self {
        info!(
            "Initializing cache registry (l2={}, backfill={})",
            l2.is_some(),
            options.backfill
        );

        Self {
            stack: Arc::new(CacheStack::new(l1, l2, options)),
            sweepers: Vec::new(),
        }
    }

    /// Build the configured backends and assemble a registry.
    ///
    /// Memory tiers with a non-zero sweep interval get a background
    /// sweeper task, so this must run inside a Tokio runtime. Sweepers
    /// are aborted when the registry is dropped.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let mut sweepers = Vec::new();

        let l1 = Self::build_tier(&config.l1, &mut sweepers)?;
        let l2 = match &config.l2 {
            Some(tier) => Some(Self::build_tier(tier, &mut sweepers)?),
            None => None,
        };

        let mut registry = Self::new(l1, l2, config.stack_options());
        registry.sweepers = sweepers;
        Ok(registry)
    }

    fn build_tier(
        config: &TierConfig,
        sweepers: &mut Vec<tokio::task::JoinHandle<()>>,
    ) -> Result<Arc<dyn CacheStrategy>> {
        match config {
            TierConfig::Memory(memory) => {
                let strategy = MemoryStrategy::new();
                if memory.sweep_interval_ms > 0 {
                    sweepers.push(
                        strategy.start_sweeper(Duration::from_millis(memory.sweep_interval_ms)),
                    );
                }
                Ok(Arc::new(strategy))
            }
            TierConfig::Disk(disk) => {
                let strategy = DiskStrategy::new(DiskConfig {
                    directory: disk.directory.clone(),
                    max_entries: disk.max_entries,
                    index_flush_every: disk.index_flush_every,
                })?;
                Ok(Arc::new(strategy))
            }
        }
    }

    /// Hand out a typed cache view bound to `name`.
    pub fn namespace<V>(&self, name: &str) -> Cache<V>
    where
        V: Serialize + DeserializeOwned,
    {
        Cache::new(name, Arc::clone(&self.stack))
    }

    /// Snapshot of the shared stack's counters.
    pub fn stats(&self) -> CacheStats {
        self.stack.stats()
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        for sweeper in &self.sweepers {
            sweeper.abort();
        }
    }
}
