//! Background expiry sweep
//!
//! Lazy expiry on `get` is what keeps expired results from being served;
//! the sweep only reclaims capacity and forgets dependency records early.

use crate::cache::QueryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start a task that calls [`expire_stale`](Self::expire_stale) every
    /// `interval`
    ///
    /// The task only holds a weak reference and exits once the cache is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(Duration::from_millis(1));
        let cache = Arc::downgrade(self);
        info!("Starting cache sweep task (interval={:?})", interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(cache) = cache.upgrade() else {
                    info!("Cache dropped, stopping sweep task");
                    break;
                };

                let expired = cache.expire_stale();
                if expired > 0 {
                    debug!("Sweep removed {} expired entries", expired);
                }
            }
        })
    }

    /// Start the sweep configured by `sweep_interval`, if any
    pub fn start_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.config()
            .sweep_interval
            .map(|interval| self.spawn_sweeper(interval))
    }
}
