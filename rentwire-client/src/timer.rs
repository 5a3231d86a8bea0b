//! Cancellable timers
//!
//! A [`Timer`] owns the tokio task that waits and then runs its callback.
//! Cancelling aborts that task. The manager never relies on drop to stop a
//! timer: every arming call site has a matching `cancel()` on each teardown
//! path, and the callbacks only post tagged inputs to the event loop, so a
//! tick that slipped out just before cancellation is recognized as stale.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Handle to a scheduled callback
#[derive(Debug)]
pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `f` once after `delay`
    pub(crate) fn once<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            f();
        });
        Self { handle }
    }

    /// Run `f` every `period`, first after one full period
    pub(crate) fn every<F>(period: Duration, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                f();
            }
        });
        Self { handle }
    }

    /// Stop the timer; its callback will not run again
    pub(crate) fn cancel(self) {
        self.handle.abort();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
