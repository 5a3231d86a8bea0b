//! Heartbeat monitor
//!
//! While the channel is open, a ping is due every interval. The monitor only
//! owns the timer; the tick callback posts to the manager's event loop, which
//! builds and writes the ping so it is ordered with every other write.
//!
//! The monitor is armed on open and disarmed as the very first step of every
//! close path, so it is active exactly while the channel is open.

use crate::timer::Timer;
use std::time::Duration;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

pub(crate) struct Heartbeat {
    interval: Duration,
    timer: Option<Timer>,
}

impl Heartbeat {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    /// Arm the periodic tick, replacing any previous timer
    pub(crate) fn start<F>(&mut self, tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.timer = Some(Timer::every(self.interval, tick));
    }

    /// Disarm; safe to call when not running
    pub(crate) fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_start_stop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        assert!(!heartbeat.is_active());

        let counter = Arc::clone(&ticks);
        heartbeat.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(heartbeat.is_active());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        heartbeat.stop();
        assert!(!heartbeat.is_active());
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        // Idempotent
        heartbeat.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut heartbeat = Heartbeat::new(Duration::from_secs(10));

        for _ in 0..3 {
            let counter = Arc::clone(&ticks);
            heartbeat.start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        heartbeat.stop();
    }
}
