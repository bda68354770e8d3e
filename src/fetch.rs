//! Cached fetch state for consuming views
//!
//! A `CachedFetch` binds one cache key to one async producer and exposes a
//! Loading/Ready/Failed state that views can read or subscribe to. Fresh
//! cached values short-circuit the producer; successful fetches are written
//! through to the shared cache; failures never touch it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::TtlCache;

/// Zero-argument async data source for a cached fetch
pub type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Wraps an async closure as a [`Producer`]
pub fn producer<T, F, Fut>(f: F) -> Producer<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// State of a cached fetch as seen by a consumer
#[derive(Debug, Clone)]
pub enum FetchState<T> {
    /// A fetch cycle is in progress
    Loading,
    /// The latest cycle produced a value
    Ready(T),
    /// The latest cycle failed
    Failed(Arc<ApiError>),
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Arc<ApiError>> {
        match self {
            FetchState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Per-fetch cache behaviour
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// TTL for values written by this fetch; the cache default when `None`
    pub ttl: Option<Duration>,
    /// Never read from or write to the cache
    pub skip_cache: bool,
}

struct Source<T> {
    key: String,
    producer: Producer<T>,
}

// Lock order: `cycle` before `source`. `source` is never held while the
// state channel is touched, so readers holding a state borrow can still
// call `key()`.
struct Inner<T> {
    cache: Arc<TtlCache>,
    options: FetchOptions,
    /// Generation of the latest cycle; only that cycle may commit
    cycle: Mutex<u64>,
    source: Mutex<Source<T>>,
    state: watch::Sender<FetchState<T>>,
}

/// Handle to one key/producer binding
///
/// Clones share the same state and generation, so a refresh started from
/// one clone supersedes an in-flight cycle started from another.
pub struct CachedFetch<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CachedFetch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CachedFetch<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a fetch in the `Loading` state; nothing runs until [`load`](Self::load)
    pub fn new(
        cache: Arc<TtlCache>,
        key: impl Into<String>,
        producer: Producer<T>,
        options: FetchOptions,
    ) -> Self {
        let (state, _) = watch::channel(FetchState::Loading);
        Self {
            inner: Arc::new(Inner {
                cache,
                options,
                cycle: Mutex::new(0),
                source: Mutex::new(Source {
                    key: key.into(),
                    producer,
                }),
                state,
            }),
        }
    }

    // Both locks are held only for short synchronous sections, never across an await.
    fn lock_cycle(&self) -> MutexGuard<'_, u64> {
        self.inner
            .cycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_source(&self) -> MutexGuard<'_, Source<T>> {
        self.inner
            .source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the key of the current binding
    pub fn key(&self) -> String {
        self.lock_source().key.clone()
    }

    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn error(&self) -> Option<Arc<ApiError>> {
        self.inner.state.borrow().error().cloned()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    /// Runs a fetch cycle, serving a fresh cached value if one exists
    pub async fn load(&self) {
        self.run(false).await;
    }

    /// Runs a fetch cycle that always calls the producer
    ///
    /// The result is still written to the cache unless `skip_cache` is set.
    pub async fn refresh(&self) {
        self.run(true).await;
    }

    /// Starts a refresh in the background
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.refresh().await })
    }

    /// Rebinds to a new key and producer
    ///
    /// A new cycle runs only when the key differs from the current one; any
    /// cycle still in flight for the old key is superseded.
    pub async fn set_key(&self, key: impl Into<String>, producer: Producer<T>) {
        let key = key.into();
        let changed = {
            let mut generation = self.lock_cycle();
            let mut source = self.lock_source();
            let changed = source.key != key;
            if changed {
                // Results still in flight belong to the old key
                *generation += 1;
            }
            source.key = key;
            source.producer = producer;
            changed
        };

        if changed {
            self.load().await;
        }
    }

    async fn run(&self, force: bool) {
        let (key, producer, generation) = {
            let mut generation = self.lock_cycle();
            *generation += 1;
            let (key, producer) = {
                let source = self.lock_source();
                (source.key.clone(), Arc::clone(&source.producer))
            };
            self.inner.state.send_replace(FetchState::Loading);
            (key, producer, *generation)
        };
        let options = &self.inner.options;

        if !options.skip_cache && !force {
            if let Some(data) = self.inner.cache.get::<T>(&key) {
                self.commit(generation, &key, Ok(data), false);
                return;
            }
        }

        let result = producer().await;
        if let Err(e) = &result {
            warn!(key = %key, generation, error = %e, "fetch failed");
        }
        self.commit(generation, &key, result, !options.skip_cache);
    }

    /// Applies a cycle's outcome if no newer cycle has started
    fn commit(&self, generation: u64, key: &str, result: Result<T, ApiError>, write_through: bool) {
        let current = self.lock_cycle();
        if *current != generation {
            debug!(key, generation, current = *current, "discarding superseded fetch result");
            return;
        }

        match result {
            Ok(data) => {
                if write_through {
                    self.inner.cache.set(key, &data, self.inner.options.ttl);
                }
                self.inner.state.send_replace(FetchState::Ready(data));
            }
            Err(e) => {
                self.inner.state.send_replace(FetchState::Failed(Arc::new(e)));
            }
        }
    }
}
