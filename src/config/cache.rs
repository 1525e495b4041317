//! Generation-guarded async memoization.
//!
//! [`CachedValue`] computes its value on first access and keeps it until
//! [`CachedValue::invalidate`] is called. The state machine is:
//!
//! - `Empty` → first access spawns the computation and moves to `Computing`
//! - `Computing` → concurrent accesses attach to the same result channel
//! - `Computing` → `Ready` on success, back to `Empty` on failure
//! - any state → `Empty` on invalidate, bumping the generation
//!
//! A computation only writes its result into the cache if the generation it
//! started under is still current. Waiters always receive the result of the
//! computation they attached to.

use crate::error::{FileSetError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Boxed future produced by a cache loader.
pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

type Loader<T> = Arc<dyn Fn() -> LoadFuture<T> + Send + Sync>;

/// `None` until the computation finishes.
type Outcome<T> = Option<Result<T>>;

enum CacheState<T> {
    Empty,
    Computing {
        generation: u64,
        results: watch::Receiver<Outcome<T>>,
    },
    Ready(T),
}

struct Slot<T> {
    generation: u64,
    state: CacheState<T>,
}

/// A lazily computed value shared by every clone of the cache.
pub struct CachedValue<T> {
    slot: Arc<Mutex<Slot<T>>>,
    loader: Loader<T>,
    computations: Arc<AtomicU64>,
}

impl<T> Clone for CachedValue<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            loader: Arc::clone(&self.loader),
            computations: Arc::clone(&self.computations),
        }
    }
}

impl<T> std::fmt::Debug for CachedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.slot);
        let state = match slot.state {
            CacheState::Empty => "empty",
            CacheState::Computing { .. } => "computing",
            CacheState::Ready(_) => "ready",
        };
        f.debug_struct("CachedValue")
            .field("generation", &slot.generation)
            .field("state", &state)
            .finish()
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> CachedValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty cache around `loader`.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                state: CacheState::Empty,
            })),
            loader: Arc::new(move || Box::pin(loader()) as LoadFuture<T>),
            computations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the value, computing it if needed.
    ///
    /// Concurrent callers share one computation. The computation runs on its
    /// own task, so dropping this future does not cancel it.
    pub async fn get(&self) -> Result<T> {
        let mut results = {
            let mut slot = lock(&self.slot);
            let in_flight = match &slot.state {
                CacheState::Ready(value) => return Ok(value.clone()),
                CacheState::Computing { results, .. } if results.has_changed().is_ok() => {
                    Some(results.clone())
                }
                // Empty, or a computation whose task died without reporting
                _ => None,
            };
            match in_flight {
                Some(results) => results,
                None => self.start(&mut slot),
            }
        };

        let outcome = match results.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(FileSetError::ComputationAbandoned))
    }

    /// The current value if one is cached. Never starts a computation.
    pub fn peek(&self) -> Option<T> {
        match &lock(&self.slot).state {
            CacheState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Drop the cached value and start a new generation.
    ///
    /// An in-flight computation keeps running for its waiters but its result
    /// will not be stored.
    pub fn invalidate(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = CacheState::Empty;
        debug!("Cache invalidated, generation {}", slot.generation);
    }

    /// Current generation, bumped by every invalidate.
    pub fn generation(&self) -> u64 {
        lock(&self.slot).generation
    }

    /// Number of computations started so far.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    fn start(&self, slot: &mut Slot<T>) -> watch::Receiver<Outcome<T>> {
        let generation = slot.generation;
        let (tx, rx) = watch::channel(None);
        slot.state = CacheState::Computing {
            generation,
            results: rx.clone(),
        };
        self.computations.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self.slot);
        let future = (self.loader)();
        tokio::spawn(async move {
            let result = future.await;
            {
                let mut slot = lock(&shared);
                let current = matches!(
                    slot.state,
                    CacheState::Computing { generation: g, .. } if g == generation
                ) && slot.generation == generation;

                if current {
                    slot.state = match &result {
                        Ok(value) => CacheState::Ready(value.clone()),
                        Err(_) => CacheState::Empty,
                    };
                } else {
                    debug!("Discarding result computed for stale generation {}", generation);
                }
            }
            let _ = tx.send(Some(result));
        });

        rx
    }
}
