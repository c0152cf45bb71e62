//! Periodic expiry sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::pool::LabelPool;

/// Runs [`LabelPool::expire_sweep`] on a fixed interval until stopped.
pub struct ExpirySweeper {
    pool: LabelPool,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ExpirySweeper {
    pub fn new(pool: LabelPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Spawns the sweep loop on the current tokio runtime. The first sweep
    /// runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        // tokio::time::interval rejects a zero period.
        let interval = self.interval.max(Duration::from_millis(10));

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let pool = pool.clone();
                match tokio::task::spawn_blocking(move || pool.expire_sweep()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Expiry sweep failed"),
                    Err(e) => tracing::error!(error = %e, "Expiry sweep task panicked"),
                }
            }

            tracing::debug!("Expiry sweeper stopped");
        })
    }

    /// Signals the loop to exit at its next wake-up and wakes it now.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}
