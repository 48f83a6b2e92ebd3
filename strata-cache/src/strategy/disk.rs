//! Persistent disk-backed cache tier.
//!
//! Values are appended to a single data file; a JSON index maps each
//! key to its offset, length, and optional expiry. The index is
//! rewritten every few mutations and on [`DiskStrategy::flush`], so a
//! reopened cache sees every flushed entry. Overwritten and deleted
//! values leave garbage in the data file until [`CacheStrategy::clear`]
//! truncates it; compaction is out of scope for a cache (entries are
//! reproducible by definition).

use super::CacheStrategy;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const DATA_FILE: &str = "cache.dat";

/// Index entry for one stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    offset: u64,
    size: u64,
    /// Unix millis after which the value is expired
    expires_at_ms: Option<u64>,
    /// Unix millis of the write, used for capacity eviction
    written_at_ms: u64,
}

impl IndexEntry {
    fn is_expired(&self) -> bool {
        self.expires_at_ms.is_some_and(|expires| now_ms() >= expires)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Disk tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Directory holding the data file and index
    pub directory: PathBuf,
    /// Maximum number of entries before least-recently-written eviction
    pub max_entries: usize,
    /// Persist the index every N mutations
    pub index_flush_every: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/cache"),
            max_entries: 100_000,
            index_flush_every: 64,
        }
    }
}

/// Persistent cache tier over an append-only data file plus JSON index.
pub struct DiskStrategy {
    config: DiskConfig,
    index: Arc<RwLock<HashMap<String, IndexEntry>>>,
    data_file: Arc<Mutex<File>>,
    write_offset: Arc<Mutex<u64>>,
    mutations: AtomicU64,
}

impl DiskStrategy {
    /// Create or reopen a disk tier at `config.directory`.
    pub fn new(config: DiskConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        let data_path = config.directory.join(DATA_FILE);
        let data_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&data_path)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        let index = Self::load_index(&config.directory)?;
        let write_offset = data_file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        info!(
            "Opened disk cache at {:?} ({} indexed entries)",
            config.directory,
            index.len()
        );

        Ok(Self {
            config,
            index: Arc::new(RwLock::new(index)),
            data_file: Arc::new(Mutex::new(data_file)),
            write_offset: Arc::new(Mutex::new(write_offset)),
            mutations: AtomicU64::new(0),
        })
    }

    fn load_index(directory: &Path) -> Result<HashMap<String, IndexEntry>> {
        let index_path = directory.join(INDEX_FILE);

        if !index_path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&index_path)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        serde_json::from_str(&contents)
            .map_err(|e| CacheError::Serialization(format!("failed to parse index: {}", e)))
    }

    fn save_index(&self) -> Result<()> {
        let index_path = self.config.directory.join(INDEX_FILE);
        let json = {
            let index = self.index.read();
            serde_json::to_string(&*index)
                .map_err(|e| CacheError::Serialization(format!("failed to encode index: {}", e)))?
        };

        fs::write(&index_path, json).map_err(|e| CacheError::BackendUnavailable(e.to_string()))
    }

    /// Persist the index now, regardless of the flush counter.
    pub fn flush(&self) -> Result<()> {
        self.save_index()
    }

    /// Number of indexed entries, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// True if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn note_mutation(&self) {
        let count = self.mutations.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.index_flush_every > 0 && count % self.config.index_flush_every == 0 {
            if let Err(e) = self.save_index() {
                warn!("Failed to persist disk cache index: {}", e);
            }
        }
    }

    /// Evict the least-recently-written entry to make room.
    fn evict_oldest(&self) {
        let victim = {
            let index = self.index.read();
            index
                .iter()
                .min_by_key(|(_, entry)| entry.written_at_ms)
                .map(|(key, _)| key.clone())
        };

        if let Some(key) = victim {
            debug!("Disk cache EVICT: {}", key);
            self.index.write().remove(&key);
        }
    }
}

#[async_trait]
impl CacheStrategy for DiskStrategy {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = {
            let index = self.index.read();
            index.get(key).cloned()
        };

        let Some(entry) = entry else {
            return Ok(None);
        };

        if entry.is_expired() {
            debug!("Disk key expired: {}", key);
            self.index.write().remove(key);
            return Ok(None);
        }

        let mut file = self.data_file.lock();
        file.seek(SeekFrom::Start(entry.offset))
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        let mut buffer = vec![0u8; entry.size as usize];
        file.read_exact(&mut buffer)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        Ok(Some(buffer))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        debug!("Disk SET key={}, size={}, ttl={:?}", key, value.len(), ttl);

        let is_new = !self.index.read().contains_key(key);
        if is_new && self.index.read().len() >= self.config.max_entries {
            self.evict_oldest();
        }

        let size = value.len() as u64;
        let offset = {
            let mut offset_guard = self.write_offset.lock();
            let mut file = self.data_file.lock();
            let offset = *offset_guard;

            file.seek(SeekFrom::Start(offset))
                .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
            file.write_all(&value)
                .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
            file.flush()
                .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

            *offset_guard += size;
            offset
        };

        let now = now_ms();
        let entry = IndexEntry {
            offset,
            size,
            expires_at_ms: ttl.map(|ttl| now + ttl.as_millis() as u64),
            written_at_ms: now,
        };
        self.index.write().insert(key.to_string(), entry);

        self.note_mutation();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("Disk DELETE key={}", key);

        if self.index.write().remove(key).is_some() {
            self.note_mutation();
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut index = self.index.write();
        debug!("Disk CLEAR ({} entries)", index.len());
        index.clear();
        drop(index);

        *self.write_offset.lock() = 0;
        self.data_file
            .lock()
            .set_len(0)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        self.save_index()
    }
}
