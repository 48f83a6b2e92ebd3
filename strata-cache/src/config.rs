use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stack::StackOptions;

/// Cache configuration: one mandatory first tier, an optional second
/// tier, and the tiering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub l1: TierConfig,
    pub l2: Option<TierConfig>,
    pub stack: StackConfig,
}

/// Backend selection for one tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum TierConfig {
    Memory(MemoryTierConfig),
    Disk(DiskTierConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTierConfig {
    /// Background sweep interval in milliseconds; 0 disables the
    /// sweeper and leaves eviction entirely to lazy read-time checks
    pub sweep_interval_ms: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskTierConfig {
    pub directory: PathBuf,
    pub max_entries: usize,
    pub index_flush_every: u64,
}

impl Default for DiskTierConfig {
    fn default() -> Self {
        let defaults = crate::strategy::DiskConfig::default();
        Self {
            directory: defaults.directory,
            max_entries: defaults.max_entries,
            index_flush_every: defaults.index_flush_every,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub backfill: bool,
    /// TTL clamp for backfilled L1 entries, in seconds
    pub backfill_ttl_secs: Option<u64>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            backfill: true,
            backfill_ttl_secs: Some(60),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1: TierConfig::Memory(MemoryTierConfig::default()),
            l2: None,
            stack: StackConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Convert the tiering section to [`StackOptions`].
    pub fn stack_options(&self) -> StackOptions {
        StackOptions {
            backfill: self.stack.backfill,
            backfill_ttl: self.stack.backfill_ttl_secs.map(Duration::from_secs),
        }
    }
}
