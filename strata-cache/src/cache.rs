use crate::error::{CacheError, Result};
use crate::stack::CacheStack;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Namespaced, typed view over a [`CacheStack`].
///
/// Every raw key is qualified as `<namespace>:<raw key>` before it
/// touches a backend, so two namespaces over the same stack never
/// collide. Values are encoded as JSON; the value type is chosen once
/// per namespace at [`crate::CacheRegistry::namespace`] time.
pub struct Cache<V> {
    namespace: String,
    stack: Arc<CacheStack>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            stack: Arc::clone(&self.stack),
            _value: PhantomData,
        }
    }
}

impl<V> Cache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub(crate) fn new(namespace: impl Into<String>, stack: Arc<CacheStack>) -> Self {
        Self {
            namespace: namespace.into(),
            stack,
            _value: PhantomData,
        }
    }

    /// The namespace this view prefixes onto every key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn qualified(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn encode(value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<V> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Look up a value. Unknown and expired keys report `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        let qualified = self.qualified(key);
        match self.stack.get(&qualified).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a value at every tier, expiring after `ttl` if given.
    pub async fn set(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<()> {
        let qualified = self.qualified(key);
        let bytes = Self::encode(value)?;
        self.stack.set(&qualified, bytes, ttl).await
    }

    /// Remove a key from every tier. No-op if the key is absent.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let qualified = self.qualified(key);
        self.stack.delete(&qualified).await
    }

    /// Drop every entry in the underlying tiers.
    ///
    /// Tiers are shared across namespaces via key prefixing, so this
    /// clears the stack for every namespace layered over it.
    pub async fn clear(&self) -> Result<()> {
        debug!("CLEAR namespace={}", self.namespace);
        self.stack.clear().await
    }

    /// Return the cached value for `key`, computing and storing it via
    /// `loader` on a miss.
    ///
    /// On a hit the loader is never invoked. On a miss, concurrent
    /// callers for the same key share a single loader execution and
    /// all observe its value. A loader failure is delivered to every
    /// waiter as [`CacheError::Loader`] and nothing is cached.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Duration>, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let qualified = self.qualified(key);
        let bytes = self
            .stack
            .get_or_load(&qualified, ttl, || async {
                let value = loader().await.map_err(CacheError::loader)?;
                Self::encode(&value)
            })
            .await?;

        Self::decode(&bytes)
    }
}
