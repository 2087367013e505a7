//! Snapshot cache in front of the store.
//!
//! [`CacheManager`] owns the published [`MatchIndex`] and decides when to
//! rebuild it:
//!
//! - lazily, when a reader finds the snapshot older than the TTL
//!   (only while auto-refresh is off),
//! - on the next access after [`CacheManager::invalidate`],
//! - on every tick of the optional auto-refresh task,
//! - on demand through [`CacheManager::warm_up`] / [`CacheManager::force_reload`].
//!
//! Rebuilds are single-flight: one async mutex guards the rebuild path only.
//! A caller records how many attempts had completed before it queued; if one
//! completed while it waited, it takes that outcome instead of loading again,
//! unless an invalidation arrived after that attempt started reading.
//! Readers never take the mutex, they clone the current `Arc` and go.
//!
//! Invalidation is a generation counter. Each published snapshot remembers
//! the generation it was loaded under, so a write that lands mid-load leaves
//! the result stale without any flag juggling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::matcher::MatchIndex;
use crate::store::{QaStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No snapshot has ever been published and loading failed.
    #[error("no snapshot available: {0}")]
    ColdStart(StoreError),

    /// An explicit rebuild failed. The previous snapshot stays published.
    #[error("rebuild failed: {0}")]
    Rebuild(StoreError),
}

/// Lifecycle settings, fixed for the lifetime of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub auto_refresh: bool,
    pub auto_refresh_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            auto_refresh: false,
            auto_refresh_interval: Duration::from_secs(120),
        }
    }
}

/// Operator-facing view of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub version: Option<u64>,
    pub entries: usize,
    pub loaded_at_utc: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub stale: bool,
    pub invalidated: bool,
    pub auto_refresh: bool,
    pub rebuilds: u64,
    pub failed_rebuilds: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A reader found the snapshot missing, expired, or invalidated.
    Lazy,
    /// Warm-up.
    Explicit,
    /// Operator reload. Never joins an attempt that finished while it waited.
    Forced,
    /// Auto-refresh tick.
    Timer,
}

#[derive(Default)]
struct RebuildLog {
    rebuilds: u64,
    failed_rebuilds: u64,
    /// Error of the most recent attempt; `None` when it succeeded.
    last_error: Option<StoreError>,
}

#[derive(Clone)]
struct Published {
    index: Arc<MatchIndex>,
    /// Invalidation generation read before the load began.
    generation: u64,
}

pub struct CacheManager {
    store: Arc<dyn QaStore>,
    config: CacheConfig,
    current: RwLock<Option<Published>>,
    /// Bumped by every `invalidate()`.
    invalidations: AtomicU64,
    rebuild_lock: tokio::sync::Mutex<()>,
    /// Finished rebuild attempts, successful or not.
    completed: AtomicU64,
    /// Version of the last published snapshot.
    published: AtomicU64,
    log: Mutex<RebuildLog>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn QaStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            current: RwLock::new(None),
            invalidations: AtomicU64::new(0),
            rebuild_lock: tokio::sync::Mutex::new(()),
            completed: AtomicU64::new(0),
            published: AtomicU64::new(0),
            log: Mutex::new(RebuildLog::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Currently published snapshot, whatever its age.
    #[must_use]
    pub fn current(&self) -> Option<Arc<MatchIndex>> {
        self.published_snapshot().map(|p| p.index)
    }

    /// Snapshot to answer a query from, rebuilding first when it is missing,
    /// invalidated, or past its TTL.
    ///
    /// A failed lazy rebuild keeps serving the previous snapshot; only a cold
    /// cache surfaces the store error.
    pub async fn snapshot(&self) -> Result<Arc<MatchIndex>, CacheError> {
        let seen = self.completed.load(Ordering::Acquire);
        if let Some(current) = self.published_snapshot() {
            if !self.is_stale(&current) {
                return Ok(current.index);
            }
        }
        self.refresh(seen, Trigger::Lazy).await
    }

    /// Mark the snapshot stale so the next access rebuilds regardless of TTL.
    /// Call after every successful mutation of the store.
    pub fn invalidate(&self) {
        let generation = self.invalidations.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Match index invalidated (generation {generation})");
    }

    /// Eager initial load, typically at process start. Joins a rebuild that
    /// finishes while this call waits for the lock.
    pub async fn warm_up(&self) -> Result<Arc<MatchIndex>, CacheError> {
        let seen = self.completed.load(Ordering::Acquire);
        let index = self.refresh(seen, Trigger::Explicit).await?;
        info!("Match index warmed up with {} entries", index.len());
        Ok(index)
    }

    /// Rebuild now and report failure to the caller. Always reads the store
    /// after this call starts; it waits behind an in-flight rebuild but never
    /// reuses its result.
    pub async fn force_reload(&self) -> Result<Arc<MatchIndex>, CacheError> {
        let seen = self.completed.load(Ordering::Acquire);
        self.refresh(seen, Trigger::Forced).await
    }

    /// Start the periodic rebuild task when auto-refresh is configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_auto_refresh(self: &Arc<Self>) -> Option<AutoRefreshHandle> {
        if !self.config.auto_refresh {
            return None;
        }

        let period = self.config.auto_refresh_interval.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cache = Arc::clone(self);
        let cancel = token.clone();

        let task = tokio::spawn(async move {
            info!("Auto-refresh started (interval={period:?})");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let seen = cache.completed.load(Ordering::Acquire);
                        match cache.refresh(seen, Trigger::Timer).await {
                            Ok(index) => debug!("Auto-refresh published version {}", index.version()),
                            Err(e) => warn!("Auto-refresh failed: {e}"),
                        }
                    }
                }
            }
            info!("Auto-refresh stopped");
        });

        Some(AutoRefreshHandle {
            token,
            task: Some(task),
        })
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let current = self.published_snapshot();
        let index = current.as_ref().map(|p| &p.index);
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            version: index.map(|i| i.version()),
            entries: index.map_or(0, |i| i.len()),
            loaded_at_utc: index.map(|i| i.loaded_at_utc()),
            age_secs: index.map(|i| i.age().as_secs()),
            stale: current.as_ref().is_none_or(|p| self.is_stale(p)),
            invalidated: current.as_ref().is_some_and(|p| self.is_invalidated(p)),
            auto_refresh: self.config.auto_refresh,
            rebuilds: log.rebuilds,
            failed_rebuilds: log.failed_rebuilds,
            last_error: log.last_error.as_ref().map(ToString::to_string),
        }
    }

    fn published_snapshot(&self) -> Option<Published> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// An invalidation arrived after this snapshot started loading.
    fn is_invalidated(&self, current: &Published) -> bool {
        current.generation < self.invalidations.load(Ordering::Acquire)
    }

    /// With auto-refresh on, age alone never makes a snapshot stale.
    fn is_stale(&self, current: &Published) -> bool {
        self.is_invalidated(current)
            || (!self.config.auto_refresh && current.index.age() >= self.config.ttl)
    }

    async fn refresh(&self, seen: u64, trigger: Trigger) -> Result<Arc<MatchIndex>, CacheError> {
        let _guard = self.rebuild_lock.lock().await;
        let joined = self.completed.load(Ordering::Acquire) != seen;

        if joined && trigger != Trigger::Forced {
            // An attempt completed while this caller queued. A failure is shared
            // as is; a success is reused unless a newer write invalidated it.
            // Age is not rechecked, otherwise a zero TTL would load once per
            // waiter.
            if self.last_error().is_some() {
                debug!("Joining failed rebuild ({trigger:?})");
                return self.last_outcome(trigger);
            }
            if let Some(current) = self.published_snapshot() {
                if !self.is_invalidated(&current) {
                    debug!("Joining rebuild completed while waiting ({trigger:?})");
                    return Ok(current.index);
                }
            }
        } else if trigger == Trigger::Lazy {
            if let Some(current) = self.published_snapshot() {
                if !self.is_stale(&current) {
                    return Ok(current.index);
                }
            }
        }

        self.rebuild(trigger).await
    }

    /// Caller holds `rebuild_lock`.
    async fn rebuild(&self, trigger: Trigger) -> Result<Arc<MatchIndex>, CacheError> {
        let generation = self.invalidations.load(Ordering::Acquire);
        debug!("Rebuilding match index ({trigger:?}, generation {generation})");

        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.list_all())
            .await
            .unwrap_or_else(|e| Err(StoreError::Unavailable(format!("load task failed: {e}"))));

        let outcome = match loaded {
            Ok(entries) => {
                let version = self.published.fetch_add(1, Ordering::AcqRel) + 1;
                let index = Arc::new(MatchIndex::build(version, entries));
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Published {
                    index: Arc::clone(&index),
                    generation,
                });

                let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
                log.rebuilds += 1;
                log.last_error = None;
                info!(
                    "Match index version {} published ({} entries)",
                    version,
                    index.len()
                );
                Ok(index)
            }
            Err(err) => {
                {
                    let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
                    log.failed_rebuilds += 1;
                    log.last_error = Some(err.clone());
                }
                if self.current().is_some() {
                    warn!("Match index rebuild failed, keeping previous snapshot: {err}");
                } else {
                    warn!("Match index rebuild failed with no snapshot to fall back on: {err}");
                }
                self.failure_outcome(trigger, err)
            }
        };

        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    fn last_error(&self) -> Option<StoreError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error
            .clone()
    }

    /// Outcome of the most recent attempt, as seen by a caller that joined it.
    fn last_outcome(&self, trigger: Trigger) -> Result<Arc<MatchIndex>, CacheError> {
        match (self.last_error(), self.current()) {
            (None, Some(index)) => Ok(index),
            (Some(err), _) => self.failure_outcome(trigger, err),
            // Unreachable in practice: a successful attempt always publishes.
            (None, None) => Err(CacheError::ColdStart(StoreError::Unavailable(
                "no snapshot published".to_string(),
            ))),
        }
    }

    fn failure_outcome(
        &self,
        trigger: Trigger,
        err: StoreError,
    ) -> Result<Arc<MatchIndex>, CacheError> {
        match (trigger, self.current()) {
            (Trigger::Lazy, Some(previous)) => Ok(previous),
            (_, None) => Err(CacheError::ColdStart(err)),
            (_, Some(_)) => Err(CacheError::Rebuild(err)),
        }
    }
}

/// Stops the auto-refresh task on [`AutoRefreshHandle::stop`] or drop.
pub struct AutoRefreshHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AutoRefreshHandle {
    /// Cancel and wait for the task to exit.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Auto-refresh task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
