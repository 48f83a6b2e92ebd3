//! Pluggable cache backend contract.
//!
//! Any storage technology (in-process map, persistent store, remote
//! service) can serve as a tier in a [`crate::CacheStack`] by
//! implementing [`CacheStrategy`]. Backends store opaque bytes; value
//! encoding belongs to the [`crate::Cache`] facade.

pub mod disk;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::time::Duration;

pub use disk::{DiskConfig, DiskStrategy};
pub use memory::MemoryStrategy;

/// Backend contract for a single cache tier.
///
/// Implementations must be safe under concurrent access; every
/// operation may suspend for backend I/O. A miss (unknown or expired
/// key) is reported as `Ok(None)`, never as an error.
#[async_trait]
pub trait CacheStrategy: Send + Sync {
    /// Look up a value. Expired entries report a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite a value. A TTL schedules expiry at
    /// `now + ttl`; expiry is enforced lazily on read or by a
    /// background sweep, never by blocking the caller.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key. No-op if the key is absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop every entry in the backend.
    async fn clear(&self) -> Result<()>;

    /// Return the cached value for `key`, computing and storing it via
    /// `loader` on a miss.
    ///
    /// This is the single-tier primitive; cross-tier orchestration and
    /// stampede protection live in [`crate::CacheStack::get_or_load`].
    async fn get_or_set(
        &self,
        key: &str,
        loader: BoxFuture<'_, Result<Vec<u8>>>,
        ttl: Option<Duration>,
    ) -> Result<Vec<u8>> {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader.await?;
        self.set(key, value.clone(), ttl).await?;
        Ok(value)
    }
}
