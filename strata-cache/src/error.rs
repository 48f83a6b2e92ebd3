use std::sync::Arc;
use thiserror::Error;

/// Main error type for cache operations.
///
/// A miss is not an error: strategies report unknown or expired keys as
/// `Ok(None)`. Errors are cloneable so an in-flight load can broadcast
/// its failure to every waiter.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("loader failed: {0}")]
    Loader(Arc<anyhow::Error>),
}

impl CacheError {
    /// Wrap a loader failure for delivery to all flight waiters.
    pub fn loader(err: anyhow::Error) -> Self {
        Self::Loader(Arc::new(err))
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
