//! Expiring Key-Value Store
//!
//! Thread-safe mapping with per-entry deadlines. A reader/writer lock guards
//! the mapping and the expiration index together, so the two can never
//! disagree about which keys exist.

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{CleanupStrategy, Config};
use crate::stats::Stats;

use super::index::ExpiryIndex;
use super::sweeper::{Sweeper, SweeperHandle};

/// Entries removed per exclusive lock acquisition during a sweep. Keeps the
/// writer lock from being held across an unbounded scan; the sweep loops
/// batches until it comes up short.
const SWEEP_BATCH: usize = 256;

/// Cap on a single lifespan so `Instant` arithmetic cannot overflow.
const MAX_LIFESPAN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Value binding with its expiration deadline
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, lifespan: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + lifespan.min(MAX_LIFESPAN),
        }
    }

    /// Dead once the deadline is reached, even if still physically present
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Mapping plus expiration index, mutated only under the store's lock
pub(crate) struct Inner<V> {
    pub(crate) map: HashMap<String, Entry<V>>,
    pub(crate) index: ExpiryIndex,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            index: ExpiryIndex::new(),
        }
    }

    /// Remove a binding and its index slot together
    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let (key, entry) = self.map.remove_entry(key)?;
        self.index.remove(entry.expires_at, key);
        Some(entry)
    }
}

/// Drain every expired entry, in deadline order, in bounded batches.
///
/// The expiry check and the removal happen under one exclusive section, so a
/// key re-set with a future deadline between batches keeps its new binding:
/// the re-set already moved its index slot, and only index slots whose
/// deadline has passed are drained.
pub(crate) fn sweep_expired<V>(inner: &RwLock<Inner<V>>, stats: &Stats) -> usize {
    let mut removed = 0;
    loop {
        let now = Instant::now();
        let mut guard = inner.write();
        let keys = guard.index.take_expired(now, SWEEP_BATCH);
        let drained = keys.len();
        for key in keys {
            guard.map.remove(&key);
        }
        drop(guard);

        removed += drained;
        if drained < SWEEP_BATCH {
            break;
        }
    }
    if removed > 0 {
        stats.record_expired(removed as u64);
    }
    removed
}

/// Thread-safe in-process key-value store with per-entry time-to-live.
///
/// Cloning yields another handle to the same store. Reads take the lock in
/// shared mode and do not block each other; writes and sweeps take it
/// exclusively. An entry past its deadline is never observable, whether or
/// not a sweep has reclaimed it yet.
pub struct Store<V> {
    inner: Arc<RwLock<Inner<V>>>,
    stats: Arc<Stats>,
    config: Config,
    sweeper: Arc<Mutex<Option<SweeperHandle>>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
            sweeper: Arc::clone(&self.sweeper),
        }
    }
}

impl<V> Default for Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store with the default configuration (background sweep,
    /// one-second interval)
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a store with the given configuration.
    ///
    /// With the background strategy, the sweeper task is spawned onto the
    /// current tokio runtime. Without a runtime the store still works;
    /// expired entries are then reclaimed only by lazy checks and manual
    /// [`cleanup_expired`](Store::cleanup_expired) calls.
    pub fn with_config(config: Config) -> Self {
        let config = config.sanitized();
        let inner = Arc::new(RwLock::new(Inner::new()));
        let stats = Arc::new(Stats::new());

        let sweeper = match config.strategy {
            CleanupStrategy::Background => Sweeper::spawn(
                Arc::downgrade(&inner),
                Arc::clone(&stats),
                config.sweep_interval,
            ),
            _ => None,
        };

        Self {
            inner,
            stats,
            config,
            sweeper: Arc::new(Mutex::new(sweeper)),
        }
    }

    /// Insert or overwrite a binding that lives for `lifespan`.
    ///
    /// Re-setting a key replaces its value and deadline (last-write-wins;
    /// lifespans do not accumulate). A zero lifespan makes the key absent:
    /// any previous binding is dropped and nothing is inserted.
    pub fn set(&self, key: impl Into<String>, value: V, lifespan: Duration) {
        self.maybe_sweep();

        let key = key.into();
        let mut inner = self.inner.write();
        inner.remove(&key);
        if lifespan.is_zero() {
            return;
        }

        let entry = Entry::new(value, lifespan);
        inner.index.insert(entry.expires_at, key.clone());
        inner.map.insert(key, entry);
        self.stats.record_insert();
    }

    /// Get the live value for a key, or `None` if absent or expired.
    ///
    /// An expired entry found here is removed on the spot, so a dead value
    /// is reclaimed even if no sweep ever runs.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let inner = self.inner.read();
            match inner.map.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        self.reap_if_expired(key);
        self.stats.record_miss();
        None
    }

    /// Whether a key currently holds a live value.
    ///
    /// Same liveness semantics and opportunistic removal as [`get`](Store::get),
    /// without copying the value.
    pub fn has(&self, key: &str) -> bool {
        self.maybe_sweep();

        let now = Instant::now();
        {
            let inner = self.inner.read();
            match inner.map.get(key) {
                Some(entry) if !entry.is_expired(now) => return true,
                Some(_) => {}
                None => return false,
            }
        }

        self.reap_if_expired(key);
        false
    }

    /// Remaining lifespan of a live key, or `None` if absent or expired
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        {
            let inner = self.inner.read();
            match inner.map.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    return Some(entry.expires_at.saturating_duration_since(now));
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.reap_if_expired(key);
        None
    }

    /// Remove a key unconditionally, live or expired. Idempotent; returns
    /// whether a binding was physically present.
    pub fn del(&self, key: &str) -> bool {
        self.maybe_sweep();

        let mut inner = self.inner.write();
        inner.remove(key).is_some()
    }

    /// Remove every expired entry now; returns the count reclaimed.
    ///
    /// This is the same pass the background sweeper runs each tick.
    pub fn cleanup_expired(&self) -> usize {
        sweep_expired(&self.inner, &self.stats)
    }

    /// Number of physically present entries, including expired ones still
    /// awaiting reclamation
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    /// Whether the store holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All physically present keys (for debugging/testing)
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().map.keys().cloned().collect()
    }

    /// Operation counters for this store
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Stop the background sweeper, if one is running. Idempotent; in-flight
    /// store operations are unaffected, and lazy expiry keeps correctness.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.stop();
        }
    }

    /// Re-check a key under the exclusive lock and remove it if still
    /// expired. A concurrent re-set with a future deadline wins: the fresh
    /// binding is left untouched.
    fn reap_if_expired(&self, key: &str) {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let dead = inner
            .map
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if dead {
            inner.remove(key);
            self.stats.record_expired(1);
        }
    }

    /// Threshold strategy: sweep inline once the mapping is at or past the
    /// configured size. Called at the top of `set`, `del` and `has`.
    fn maybe_sweep(&self) {
        if self.config.strategy != CleanupStrategy::Threshold {
            return;
        }
        if self.inner.read().map.len() < self.config.size_threshold {
            return;
        }
        let removed = sweep_expired(&self.inner, &self.stats);
        if removed > 0 {
            debug!(removed, "size threshold crossed, swept expired entries");
        }
    }

    #[cfg(test)]
    fn assert_index_consistent(&self) {
        let inner = self.inner.read();
        assert_eq!(inner.map.len(), inner.index.len());
        for (key, entry) in inner.map.iter() {
            assert!(
                inner.index.contains(entry.expires_at, key),
                "key {:?} missing from index",
                key
            );
        }
    }
}
