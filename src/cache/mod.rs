//! Background async loading cache.
//!
//! [`AsyncLoadingCache`] turns a key→value computation into a non-blocking,
//! single-flight unit of work executed on an injected runtime. A miss (or a
//! stale entry) spawns the loader exactly once and stores the shared
//! in-flight handle; every concurrent `get` for the same key awaits that one
//! handle and observes its single outcome. Successful loads are kept for a
//! time-to-live measured from write time; failed loads evict the entry so
//! the next lookup retries instead of observing a poisoned value.
//!
//! # Design
//!
//! - The loader is a closure value handed to the constructor, not a
//!   subclass: per-use-site load logic stays at the call site.
//! - The runtime handle and TTL are constructor parameters. No ambient
//!   globals, so tests can supply their own runtime.
//! - The completion transition holds only a `Weak` reference to the store;
//!   dropping the cache drops its in-flight bookkeeping.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;
use tracing::debug;

/// Boxed error produced by a loader closure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for cache lookups.
pub type CacheResult<T> = Result<T, LoadError>;

/// Errors surfaced by [`AsyncLoadingCache::get`].
///
/// `Clone` so every waiter coalesced onto one in-flight load shares the same
/// outcome.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// The underlying load computation failed.
    #[error("load failed: {0}")]
    Failed(Arc<BoxError>),

    /// The background load task was aborted or panicked before resolving.
    #[error("background load task did not complete")]
    TaskFailed,
}

/// Loader closure: maps a key to a future producing the value.
type Loader<K, V> = dyn Fn(K) -> BoxFuture<'static, Result<V, BoxError>> + Send + Sync;

/// Shared handle to one in-flight load, awaited by all coalesced readers.
type InFlight<V> = Shared<BoxFuture<'static, CacheResult<Arc<V>>>>;

enum Slot<V> {
    /// A load is in flight; all readers await this one handle.
    Pending(InFlight<V>),
    /// A completed load, stale once `loaded_at` is older than the TTL.
    Ready { value: Arc<V>, loaded_at: Instant },
}

struct Store<K, V> {
    entries: Mutex<HashMap<K, Slot<V>>>,
}

/// A keyed, time-expiring, single-flight async cache.
///
/// # Example
///
/// ```ignore
/// use stratus::cache::AsyncLoadingCache;
///
/// let cache = AsyncLoadingCache::new(
///     tokio::runtime::Handle::current(),
///     Duration::from_secs(3600),
///     |key: String| async move { fetch(&key).await }.boxed(),
/// );
///
/// let value = cache.get("db.table".to_string()).await?;
/// ```
pub struct AsyncLoadingCache<K, V> {
    store: Arc<Store<K, V>>,
    loader: Arc<Loader<K, V>>,
    runtime: tokio::runtime::Handle,
    ttl: Duration,
}

impl<K, V> AsyncLoadingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Display + 'static,
    V: Send + Sync + 'static,
{
    /// Create a cache over `loader`, spawning loads on `runtime` and keeping
    /// successful entries for `ttl` from their write time.
    pub fn new<F>(runtime: tokio::runtime::Handle, ttl: Duration, loader: F) -> Self
    where
        F: Fn(K) -> BoxFuture<'static, Result<V, BoxError>> + Send + Sync + 'static,
    {
        Self {
            store: Arc::new(Store {
                entries: Mutex::new(HashMap::new()),
            }),
            loader: Arc::new(loader),
            runtime,
            ttl,
        }
    }

    /// Look up `key`, loading it if absent or stale.
    ///
    /// A fresh entry is returned immediately. A miss or a stale entry spawns
    /// exactly one load; concurrent callers for the same key await the same
    /// in-flight load and all observe its single outcome.
    ///
    /// # Errors
    ///
    /// Propagates the loader's failure as [`LoadError::Failed`]. A failed
    /// load is evicted, so a subsequent `get` retries.
    pub async fn get(&self, key: K) -> CacheResult<Arc<V>> {
        let in_flight = {
            let mut entries = self.store.entries.lock().expect("cache lock poisoned");
            match entries.get(&key) {
                Some(Slot::Ready { value, loaded_at }) if loaded_at.elapsed() < self.ttl => {
                    return Ok(Arc::clone(value));
                }
                Some(Slot::Pending(shared)) => shared.clone(),
                // Vacant or expired: this reader schedules the (re)load.
                _ => {
                    let shared = self.spawn_load(key.clone());
                    entries.insert(key, Slot::Pending(shared.clone()));
                    shared
                }
            }
        };

        in_flight.await
    }

    /// Drop the entry for `key`, if any. The next `get` reloads.
    pub fn invalidate(&self, key: &K) {
        let mut entries = self.store.entries.lock().expect("cache lock poisoned");
        entries.remove(key);
    }

    /// Number of entries currently held (pending and ready).
    pub fn len(&self) -> usize {
        self.store.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submit the load for `key` to the runtime and wrap the join handle in
    /// a shareable future that also performs the completion transition.
    fn spawn_load(&self, key: K) -> InFlight<V> {
        debug!(target: "cache", key = %key, "scheduling background load");

        let task = self.runtime.spawn((self.loader)(key.clone()));
        let store = Arc::downgrade(&self.store);

        async move {
            let result = match task.await {
                Ok(Ok(value)) => Ok(Arc::new(value)),
                Ok(Err(err)) => Err(LoadError::Failed(Arc::new(err))),
                Err(_) => Err(LoadError::TaskFailed),
            };

            Self::complete(&store, key, &result);
            result
        }
        .boxed()
        .shared()
    }

    /// Transition the entry out of `Pending`: keep the value with a fresh
    /// write stamp on success, evict on failure so the next lookup retries.
    fn complete(store: &Weak<Store<K, V>>, key: K, result: &CacheResult<Arc<V>>) {
        let Some(store) = store.upgrade() else {
            return;
        };
        let mut entries = store.entries.lock().expect("cache lock poisoned");
        match result {
            Ok(value) => {
                entries.insert(
                    key,
                    Slot::Ready {
                        value: Arc::clone(value),
                        loaded_at: Instant::now(),
                    },
                );
            }
            Err(err) => {
                debug!(target: "cache", key = %key, error = %err, "evicting failed load");
                entries.remove(&key);
            }
        }
    }
}
