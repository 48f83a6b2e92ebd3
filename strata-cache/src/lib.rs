//! # Strata Cache
//!
//! Tiered, namespaced async cache with TTL entries and single-flight loading.
//!
//! ## Features
//!
//! - **Pluggable tiers**: any backend implementing [`CacheStrategy`] can serve
//!   as the mandatory fast tier (L1) or the optional larger tier (L2)
//! - **TTL entries**: expiry is an absolute timestamp checked lazily on read,
//!   with an optional background sweeper; writes never block for the TTL
//! - **Namespaces**: one shared stack partitioned into independent key spaces
//!   by prefixing, each with its own value type
//! - **Single-flight**: concurrent `get_or_set` callers for the same key share
//!   one loader execution instead of stampeding the upstream
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strata_cache::{CacheRegistry, MemoryStrategy, StackOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Wired up once at startup and passed to collaborators
//!     let registry = CacheRegistry::new(
//!         Arc::new(MemoryStrategy::new()),
//!         None,
//!         StackOptions::default(),
//!     );
//!
//!     let sessions = registry.namespace::<String>("session");
//!     sessions.set("abc123", &"user-42".to_string(), Some(Duration::from_secs(5))).await?;
//!
//!     let user = sessions
//!         .get_or_set("abc123", None, || async { Ok("recomputed".to_string()) })
//!         .await?;
//!     assert_eq!(user, "user-42");
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod registry;
pub mod stack;
pub mod strategy;
pub mod types;

pub use cache::Cache;
pub use config::{CacheConfig, DiskTierConfig, MemoryTierConfig, StackConfig, TierConfig};
pub use error::{CacheError, Result};
pub use flight::FlightGroup;
pub use registry::CacheRegistry;
pub use stack::{CacheStack, StackOptions};
pub use strategy::{CacheStrategy, DiskConfig, DiskStrategy, MemoryStrategy};
pub use types::{CacheStats, CachedEntry};
