//! Per-key in-flight computation registry.
//!
//! [`FlightGroup`] guarantees that, for a given key, at most one loader
//! execution is in flight at a time. The first caller for a key becomes
//! the leader: it claims the flight's result slot before the registry
//! lock is released, runs the computation while holding the slot, and
//! publishes the outcome. Concurrent callers for the same key become
//! followers: they block on the slot and receive a clone of whatever
//! the leader produced, success or failure.
//!
//! A leader that is cancelled mid-computation releases the slot empty;
//! the first waiting follower observes the empty slot and is promoted,
//! running its own computation as the new leader. If every caller is
//! dropped, the flight's storage is released and nothing is published.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type Slot<T> = Arc<AsyncMutex<Option<Result<T>>>>;

enum Ticket<T> {
    /// Holds the claimed result slot for the duration of the computation.
    Leader(OwnedMutexGuard<Option<Result<T>>>, Slot<T>),
    /// Waits on the leader's slot.
    Follower(Slot<T>),
}

/// Registry of in-flight computations, keyed by fully-qualified key.
pub struct FlightGroup<T> {
    flights: Mutex<HashMap<String, Weak<AsyncMutex<Option<Result<T>>>>>>,
}

impl<T> Default for FlightGroup<T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> FlightGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a registered flight (live or abandoned).
    pub fn len(&self) -> usize {
        self.flights.lock().len()
    }

    /// True if no flights are registered.
    pub fn is_empty(&self) -> bool {
        self.flights.lock().is_empty()
    }

    /// Run `func` for `key` with duplicate suppression.
    ///
    /// The caller that registers the flight executes `func`; callers
    /// that join while it runs await the same outcome. The outcome is
    /// never cached here: once the flight completes, its registration
    /// is dropped and the next call starts a fresh one.
    pub async fn execute<F, Fut>(&self, key: &str, func: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.join(key) {
            Ticket::Leader(guard, slot) => self.lead(key, guard, &slot, func).await,
            Ticket::Follower(slot) => {
                let guard = Arc::clone(&slot).lock_owned().await;
                if let Some(outcome) = guard.as_ref() {
                    debug!("Flight follower served for key={}", key);
                    return outcome.clone();
                }

                // Empty slot after the lock: the leader was cancelled.
                // Promote ourselves and run our own computation.
                debug!("Flight leader vanished, promoting follower for key={}", key);
                self.lead(key, guard, &slot, func).await
            }
        }
    }

    fn join(&self, key: &str) -> Ticket<T> {
        let mut flights = self.flights.lock();

        if let Some(weak) = flights.get(key) {
            if let Some(slot) = weak.upgrade() {
                return Ticket::Follower(slot);
            }
        }

        let slot: Slot<T> = Arc::new(AsyncMutex::new(None));
        let guard = Arc::clone(&slot)
            .try_lock_owned()
            .expect("fresh flight slot is uncontended");
        flights.insert(key.to_string(), Arc::downgrade(&slot));

        Ticket::Leader(guard, slot)
    }

    async fn lead<F, Fut>(
        &self,
        key: &str,
        mut guard: OwnedMutexGuard<Option<Result<T>>>,
        slot: &Slot<T>,
        func: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = func().await;
        *guard = Some(outcome.clone());
        drop(guard);

        self.finish(key, slot);
        outcome
    }

    /// Deregister a completed flight, but only our own: a newer flight
    /// may already occupy the key if every holder of this one dropped.
    fn finish(&self, key: &str, slot: &Slot<T>) {
        let mut flights = self.flights.lock();
        if flights
            .get(key)
            .is_some_and(|weak| weak.ptr_eq(&Arc::downgrade(slot)))
        {
            flights.remove(key);
        }
    }
}
