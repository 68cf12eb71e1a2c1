//! TTL cache layer
//!
//! One [`TtlCache`] per upstream source, each with its own time-to-live.
//!
//! **Load-or-reuse contract:**
//! 1. A live snapshot is returned without calling the loader
//! 2. A stale or absent snapshot triggers the loader
//! 3. Loader success replaces the snapshot
//! 4. Loader failure serves the previous (stale) snapshot if one exists,
//!    leaving its timestamp alone so the next call retries
//! 5. Loader failure with nothing cached propagates the failure
//!
//! Refreshes are single-flight. While one loader runs, callers holding a stale
//! snapshot are served it immediately; only callers with nothing cached wait
//! for the loader.

use crate::sources::SourceError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Monotonic time source, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: StdMutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// One cached payload with its fetch time
#[derive(Debug)]
pub struct CachedSourceSnapshot<T> {
    pub payload: Arc<T>,
    pub fetched_at: Instant,
    pub fetched_at_utc: DateTime<Utc>,
    /// `None` never expires (load once per process)
    pub ttl: Option<Duration>,
}

impl<T> Clone for CachedSourceSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            fetched_at: self.fetched_at,
            fetched_at_utc: self.fetched_at_utc,
            ttl: self.ttl,
        }
    }
}

impl<T> CachedSourceSnapshot<T> {
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.fetched_at) >= ttl,
            None => false,
        }
    }
}

/// Freshness of a cache, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    Empty,
    Fresh { fetched_at: DateTime<Utc> },
    Stale { fetched_at: DateTime<Utc> },
}

/// Load-or-reuse cache for a single source
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<CachedSourceSnapshot<T>>>,
    refresh: Mutex<()>,
}

impl<T: Send + Sync> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Return the live snapshot or run `loader`, serving stale data on failure
    ///
    /// # Errors
    /// Only when `loader` fails and nothing was ever cached.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<T>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        if let Some(payload) = self.fresh().await {
            return Ok(payload);
        }

        let _refresh = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(stale) = self.peek().await {
                    debug!(cache = self.name, "Refresh in flight, serving stale snapshot");
                    return Ok(stale);
                }
                self.refresh.lock().await
            }
        };

        // Another caller may have refreshed while we waited
        if let Some(payload) = self.fresh().await {
            return Ok(payload);
        }

        let started = Instant::now();
        match loader().await {
            Ok(payload) => {
                let payload = Arc::new(payload);
                let snapshot = CachedSourceSnapshot {
                    payload: Arc::clone(&payload),
                    fetched_at: self.clock.now(),
                    fetched_at_utc: Utc::now(),
                    ttl: self.ttl,
                };
                *self.slot.write().await = Some(snapshot);
                info!(
                    cache = self.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Source snapshot refreshed"
                );
                Ok(payload)
            }
            Err(err) => match self.slot.read().await.as_ref() {
                Some(previous) => {
                    warn!(
                        cache = self.name,
                        error = %err,
                        fetched_at = %previous.fetched_at_utc,
                        "Refresh failed, serving stale snapshot"
                    );
                    Ok(Arc::clone(&previous.payload))
                }
                None => {
                    debug!(cache = self.name, error = %err, "Load failed with nothing cached");
                    Err(err)
                }
            },
        }
    }

    /// Current payload regardless of age
    pub async fn peek(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|s| Arc::clone(&s.payload))
    }

    pub async fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        match self.slot.read().await.as_ref() {
            None => CacheStatus::Empty,
            Some(s) if s.is_stale(now) => CacheStatus::Stale {
                fetched_at: s.fetched_at_utc,
            },
            Some(s) => CacheStatus::Fresh {
                fetched_at: s.fetched_at_utc,
            },
        }
    }

    async fn fresh(&self) -> Option<Arc<T>> {
        let now = self.clock.now();
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|s| !s.is_stale(now))
            .map(|s| Arc::clone(&s.payload))
    }
}
