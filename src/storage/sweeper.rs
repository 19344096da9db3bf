//! Expiry Sweeper
//!
//! Background task that periodically drains expired entries so memory stays
//! bounded even for keys nobody reads again.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::stats::Stats;

use super::store::{sweep_expired, Inner};

/// Background sweep task for a store.
///
/// Holds only a weak reference to the shared state: if every store handle is
/// dropped without an explicit shutdown, the next tick notices and the task
/// exits on its own.
pub(crate) struct Sweeper<V> {
    inner: Weak<RwLock<Inner<V>>>,
    stats: Arc<Stats>,
    interval: Duration,
}

/// Control handle for a running sweeper
pub(crate) struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    /// Signal the task to stop before its next sweep
    pub(crate) fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl<V: Send + Sync + 'static> Sweeper<V> {
    /// Spawn the sweeper onto the current tokio runtime.
    ///
    /// Returns `None` when no runtime is available; the store then degrades
    /// to lazy-expiry-only reclamation.
    pub(crate) fn spawn(
        inner: Weak<RwLock<Inner<V>>>,
        stats: Arc<Stats>,
        interval: Duration,
    ) -> Option<SweeperHandle> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime, expired entries will only be reclaimed lazily");
            return None;
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = Self {
            inner,
            stats,
            interval,
        };
        runtime.spawn(sweeper.run(shutdown_rx));
        Some(SweeperHandle { shutdown_tx })
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        // The first tick completes immediately; wait a full interval instead
        ticker.tick().await;

        debug!(interval = ?self.interval, "sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = self.inner.upgrade() else {
                        // Every store handle is gone; nothing left to sweep
                        break;
                    };
                    let removed = sweep_expired(&inner, &self.stats);
                    if removed > 0 {
                        debug!(removed, "swept expired entries");
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A closed channel means the store was dropped
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, Store};
    use std::thread;
    use std::time::Duration;

    #[tokio::test]
    async fn test_background_sweep_reclaims_without_reads() {
        let config = Config::default().with_sweep_interval(Duration::from_millis(40));
        let store = Store::with_config(config);

        store.set("dead", 1u8, Duration::from_millis(10));
        store.set("live", 2u8, Duration::from_secs(60));
        assert_eq!(store.len(), 2);

        // Expiry plus one interval is enough; no read ever touches "dead"
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live"), Some(2));

        store.shutdown();
    }

    #[tokio::test]
    async fn test_sweep_spares_reset_keys() {
        let config = Config::default().with_sweep_interval(Duration::from_millis(30));
        let store = Store::with_config(config);

        store.set("k", 1u8, Duration::from_millis(10));
        // Re-set with a future deadline before the sweep fires
        store.set("k", 2u8, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get("k"), Some(2));

        store.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeper() {
        let config = Config::default().with_sweep_interval(Duration::from_millis(20));
        let store = Store::with_config(config);
        store.shutdown();

        store.set("dead", 1u8, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(120)).await;

        // No sweep ran, so the entry is still physically present...
        assert_eq!(store.len(), 1);
        // ...but correctness is lazy-expiry's job either way
        assert_eq!(store.get("dead"), None);
        assert_eq!(store.len(), 0);

        // Idempotent
        store.shutdown();
    }

    #[tokio::test]
    async fn test_dropping_store_stops_sweeper() {
        let config = Config::default().with_sweep_interval(Duration::from_millis(20));
        let store = Store::with_config(config);
        store.set("k", 1u8, Duration::from_secs(60));

        // The task must notice the dead weak reference (or the closed
        // channel) and exit instead of ticking forever
        drop(store);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn test_no_runtime_degrades_to_lazy_expiry() {
        // Background strategy outside any runtime: construction succeeds,
        // reclamation is lazy-only
        let store = Store::with_config(Config::default());

        store.set("k", 1u8, Duration::from_millis(10));
        thread::sleep(Duration::from_millis(40));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), None);
        assert_eq!(store.len(), 0);

        store.shutdown();
    }
}
