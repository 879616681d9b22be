//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheInner;
use crate::error::{CacheError, Result};

// == Sweeper Handle ==
/// Owner side of a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop without waiting for it.
    ///
    /// The task observes the signal at its next select, so it is gone within
    /// one interval at the latest.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Signals the sweeper to stop and waits for the task to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the sweeper for one cache instance on the current Tokio runtime.
///
/// The task holds only a weak reference to the cache internals: once every
/// handle is dropped the next tick ends the loop. It also exits when the
/// cache leaves the Open state or the token is cancelled.
///
/// # Errors
/// `CacheError::Internal` when called outside a Tokio runtime.
pub(crate) fn spawn_sweeper<V>(
    cache: Weak<CacheInner<V>>,
    interval: Duration,
) -> Result<SweeperHandle>
where
    V: Send + Sync + 'static,
{
    let runtime = Handle::try_current().map_err(|_| {
        CacheError::Internal("background cleaning requires a Tokio runtime".to_string())
    })?;

    let token = CancellationToken::new();
    let stop = token.clone();

    let task = runtime.spawn(async move {
        info!(
            "Starting expiry sweeper with interval of {} ms",
            interval.as_millis()
        );

        // First pass one full interval after start
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = cache.upgrade() else { break };
                    if !inner.is_open() {
                        break;
                    }

                    let removed = inner.sweep_expired();
                    if removed > 0 {
                        info!("Expiry sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Expiry sweep: no expired entries found");
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    });

    Ok(SweeperHandle { token, task })
}
