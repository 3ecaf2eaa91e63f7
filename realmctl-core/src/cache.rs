//! Realm handle cache
//!
//! Maps realm ids to live store handles opened by a [`ConnectionFactory`].
//!
//! - Lookups take a shared lock and only refresh the entry's last-touched
//!   time, so cache hits never wait on each other.
//! - Misses go through one creation mutex and re-check the map under it,
//!   so a burst of first requests for a realm results in a single `open`.
//! - Idle entries are removed by sweeps and closed after removal. An entry
//!   whose [`RealmHandle`] is still held somewhere is pinned and survives
//!   sweeps; dropping a handle counts as a touch.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::HandleError;
use crate::factory::ConnectionFactory;
use crate::realm::RealmId;

/// Default idle period before an unused handle is closed (10 minutes)
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Shortest sweep period the sweeper will run at
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Longest sweep period; keeps timer deadlines far from `Instant` overflow
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Idle policy for the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Time without a touch after which an entry may be evicted
    pub idle_timeout: Duration,
    /// Period of the background sweep started by [`HandleCache::spawn_sweeper`]
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Idle timeout with the sweep running at the same period
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            sweep_interval: idle_timeout,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// No touch within the idle timeout
    Idle,
    /// Cache shutdown
    Shutdown,
}

impl RemovalCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Borrowed access to a cached realm handle.
///
/// Dereferences to the factory's handle. Holders must not close it; the
/// cache does that once the entry is evicted. While any clone of this value
/// is alive the entry is pinned and sweeps leave it alone. Dropping a clone
/// touches the entry, so the idle clock restarts when the last holder lets go.
pub struct RealmHandle<H> {
    realm: RealmId,
    inner: Arc<H>,
    last_touched: Arc<AtomicU64>,
    epoch: Instant,
}

impl<H> RealmHandle<H> {
    pub fn realm(&self) -> &RealmId {
        &self.realm
    }

    /// True when both values refer to the same underlying handle
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<H> Clone for RealmHandle<H> {
    fn clone(&self) -> Self {
        Self {
            realm: self.realm.clone(),
            inner: Arc::clone(&self.inner),
            last_touched: Arc::clone(&self.last_touched),
            epoch: self.epoch,
        }
    }
}

impl<H> Drop for RealmHandle<H> {
    // Runs before `inner` is released, so the entry is never seen unpinned
    // with a stale timestamp
    fn drop(&mut self) {
        self.last_touched
            .fetch_max(duration_nanos(self.epoch.elapsed()), Ordering::Relaxed);
    }
}

impl<H> Deref for RealmHandle<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.inner
    }
}

impl<H: fmt::Debug> fmt::Debug for RealmHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmHandle")
            .field("realm", &self.realm)
            .field("handle", &self.inner)
            .finish()
    }
}

struct CacheEntry<H> {
    handle: Arc<H>,
    /// Nanoseconds since the cache epoch, shared with outstanding handles
    last_touched: Arc<AtomicU64>,
}

impl<H> CacheEntry<H> {
    fn new(handle: Arc<H>, now: u64) -> Self {
        Self {
            handle,
            last_touched: Arc::new(AtomicU64::new(now)),
        }
    }

    fn lend(&self, realm: &RealmId, epoch: Instant) -> RealmHandle<H> {
        RealmHandle {
            realm: realm.clone(),
            inner: Arc::clone(&self.handle),
            last_touched: Arc::clone(&self.last_touched),
            epoch,
        }
    }

    fn touch(&self, now: u64) {
        self.last_touched.fetch_max(now, Ordering::Relaxed);
    }

    fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_touched.load(Ordering::Relaxed))
    }

    /// Only the map holds the handle when the count is 1
    fn is_pinned(&self) -> bool {
        Arc::strong_count(&self.handle) > 1
    }
}

/// Concurrency-safe cache of one store handle per realm.
///
/// Constructed by the composition root and shared behind an `Arc`. Call
/// [`shutdown`](Self::shutdown) before exit so every opened handle is closed.
pub struct HandleCache<F: ConnectionFactory> {
    factory: F,
    entries: RwLock<HashMap<RealmId, CacheEntry<F::Handle>>>,
    creation: Mutex<()>,
    config: CacheConfig,
    epoch: Instant,
    shut_down: AtomicBool,
}

impl<F: ConnectionFactory> HandleCache<F> {
    pub fn new(factory: F, config: CacheConfig) -> Self {
        Self {
            factory,
            entries: RwLock::new(HashMap::new()),
            creation: Mutex::new(()),
            config,
            epoch: Instant::now(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// Handle for `realm`, opening the store on first use.
    ///
    /// A hit refreshes the entry's idle clock. Factory errors are returned
    /// as [`HandleError::Open`] and nothing is cached, so the next call
    /// tries again.
    pub async fn get_or_create(
        &self,
        realm: &RealmId,
    ) -> Result<RealmHandle<F::Handle>, HandleError> {
        self.create_if_absent(realm).await.map(|(handle, _)| handle)
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting whether
    /// the entry already existed (`false` means this call opened it).
    pub async fn create_if_absent(
        &self,
        realm: &RealmId,
    ) -> Result<(RealmHandle<F::Handle>, bool), HandleError> {
        if let Some(handle) = self.touch(realm) {
            return Ok((handle, true));
        }

        let _creating = self.creation.lock().await;

        if self.shut_down.load(Ordering::Acquire) {
            return Err(HandleError::ShutDown);
        }

        // Another caller may have finished creating while we waited
        if let Some(handle) = self.touch(realm) {
            return Ok((handle, true));
        }

        let started = Instant::now();
        let handle = self.factory.open(realm).await.map_err(|source| {
            tracing::warn!(realm = %realm, error = %source, "failed to open realm store");
            HandleError::Open {
                realm: realm.clone(),
                source,
            }
        })?;

        let entry = CacheEntry::new(Arc::new(handle), self.now());
        let handle = entry.lend(realm, self.epoch);
        self.entries.write().insert(realm.clone(), entry);

        tracing::info!(
            realm = %realm,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "opened realm store"
        );

        Ok((handle, false))
    }

    /// Shared-lock lookup that refreshes the idle clock on a hit
    fn touch(&self, realm: &RealmId) -> Option<RealmHandle<F::Handle>> {
        let entries = self.entries.read();
        if self.shut_down.load(Ordering::Acquire) {
            return None;
        }

        let entry = entries.get(realm)?;
        entry.touch(self.now());

        Some(entry.lend(realm, self.epoch))
    }

    /// Remove every unpinned entry idle for at least the idle timeout and
    /// close its handle. Returns the number of entries evicted.
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = duration_nanos(self.config.idle_timeout);
        let mut evicted = Vec::new();

        {
            let mut entries = self.entries.write();
            let now = self.now();

            entries.retain(|realm, entry| {
                if entry.idle_for(now) < idle_timeout {
                    return true;
                }
                if entry.is_pinned() {
                    tracing::debug!(realm = %realm, "idle realm handle still in use");
                    return true;
                }
                evicted.push((realm.clone(), Arc::clone(&entry.handle)));
                false
            });
        }

        let count = evicted.len();
        for (realm, handle) in evicted {
            self.close_removed(&realm, &handle, RemovalCause::Idle).await;
        }

        count
    }

    /// Close every cached handle and refuse further creations.
    ///
    /// Waits for an in-flight creation to finish so its handle is closed
    /// too. Returns the number of handles closed; a repeated call returns 0.
    pub async fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let _creating = self.creation.lock().await;
        let drained: Vec<_> = self.entries.write().drain().collect();
        let count = drained.len();

        join_all(drained.iter().map(|(realm, entry)| {
            self.close_removed(realm, &entry.handle, RemovalCause::Shutdown)
        }))
        .await;

        tracing::info!(closed = count, "realm handle cache shut down");
        count
    }

    /// Eviction hook. Only ever reached for entries already out of the map.
    async fn close_removed(&self, realm: &RealmId, handle: &F::Handle, cause: RemovalCause) {
        match self.factory.close(realm, handle).await {
            Ok(()) => {
                tracing::info!(realm = %realm, cause = cause.as_str(), "closed realm store");
            }
            Err(e) => {
                tracing::warn!(
                    realm = %realm,
                    cause = cause.as_str(),
                    error = %e,
                    "failed to close realm store"
                );
            }
        }
    }

    /// Number of cached realms
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `realm` is cached. Does not touch the entry.
    pub fn contains(&self, realm: &RealmId) -> bool {
        self.entries.read().contains_key(realm)
    }

    /// Cached realms, sorted
    pub fn realms(&self) -> Vec<RealmId> {
        let mut realms: Vec<_> = self.entries.read().keys().cloned().collect();
        realms.sort();
        realms
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn now(&self) -> u64 {
        duration_nanos(self.epoch.elapsed())
    }

    /// Start the background idle sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference and ends when the cache is
    /// dropped, when [`Sweeper::stop`] is called or when the `Sweeper` is
    /// dropped. The sweep period is clamped to 1ms..=[`MAX_SWEEP_INTERVAL`].
    pub fn spawn_sweeper(self: &Arc<Self>) -> Sweeper {
        let cache = Arc::downgrade(self);
        let every = sweep_period(self.config.sweep_interval);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let start = Instant::now().checked_add(every).unwrap_or_else(Instant::now);
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let Some(cache) = cache.upgrade() else {
                    break;
                };

                let evicted = cache.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = cache.len(), "idle sweep finished");
                }
            }

            tracing::debug!("realm sweeper stopped");
        });

        tracing::debug!(interval_ms = every.as_millis() as u64, "realm sweeper started");
        Sweeper {
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to the background sweep task
pub struct Sweeper {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Whether the sweep task is still alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweep and wait for the task to finish
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!("realm sweeper panicked");
            }
        }
    }
}

fn sweep_period(requested: Duration) -> Duration {
    requested.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
