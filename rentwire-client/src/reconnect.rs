//! Reconnection strategies and the reconnect scheduler
//!
//! When the channel closes unexpectedly, the [`ReconnectScheduler`] decides
//! whether another attempt is allowed and arms a single timer for it. The
//! delay itself comes from a pluggable [`ReconnectionStrategy`].
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: `min(base * 2^n, max)` plus uniform jitter in
//!   `[0, jitter)`. The default is 1 s base, 30 s cap, 1 s jitter.
//! - **FixedDelay**: the same delay every time
//! - **NoReconnect**: never retry
//!
//! # Attempt Accounting
//!
//! The attempt counter is owned by the scheduler, not the strategy. It is
//! reset on every successful open and incremented only when a close actually
//! schedules a retry. Once it reaches the configured maximum, scheduling is
//! refused.
//!
//! # Examples
//!
//! ```rust
//! use rentwire_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::default();
//! let delay = backoff.next_delay(3).unwrap();
//! assert!(delay >= Duration::from_secs(8) && delay < Duration::from_secs(9));
//! ```

use crate::timer::Timer;
use std::time::Duration;

/// Default first-attempt delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default upper bound on the non-jittered delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default jitter window
pub const DEFAULT_JITTER: Duration = Duration::from_millis(1000);

/// Computes the delay before a reconnection attempt
///
/// The strategy is consulted once per scheduled retry with the 0-indexed
/// attempt number. `reset()` is called after every successful open.
///
/// # Attempt Cap
///
/// The cap from `ChannelBuilder::max_reconnect_attempts` is enforced by the
/// scheduler before the strategy is asked. A strategy only needs to return
/// `None` if it wants to stop earlier than that.
pub trait ReconnectionStrategy: Send + Sync {
    /// Returns the delay before the next reconnection attempt
    ///
    /// # Arguments
    ///
    /// * `attempt` - Retries already scheduled since the last open (0-indexed)
    ///
    /// # Returns
    ///
    /// - `Some(duration)`: Arm the reconnect timer for this long
    /// - `None`: Give up; the manager reports exhaustion
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rentwire_client::{ExponentialBackoff, ReconnectionStrategy};
    /// use std::time::Duration;
    ///
    /// let mut backoff = ExponentialBackoff::new(
    ///     Duration::from_millis(500),
    ///     Duration::from_secs(4),
    /// );
    /// assert_eq!(backoff.next_delay(0), Some(Duration::from_millis(500)));
    /// assert_eq!(backoff.next_delay(2), Some(Duration::from_secs(2)));
    /// assert_eq!(backoff.next_delay(9), Some(Duration::from_secs(4)));
    /// ```
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Reset the strategy state after a successful open
    ///
    /// Called each time the channel opens, before the queue is flushed.
    /// Strategies whose delay depends only on `attempt` can leave this empty.
    fn reset(&mut self);
}

/// Exponential backoff with additive jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl ExponentialBackoff {
    /// Backoff doubling from `base_delay` up to `max_delay`, without jitter
    ///
    /// # Arguments
    ///
    /// * `base_delay` - Delay before the first retry
    /// * `max_delay` - Upper bound on the delay before jitter
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: Duration::ZERO,
        }
    }

    /// Add uniform jitter in `[0, jitter)` on top of every delay
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay for `attempt` before jitter is added
    ///
    /// # Returns
    ///
    /// `min(base_delay * 2^attempt, max_delay)`. Shifts that would overflow
    /// saturate to `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    fn jitter(&self) -> Duration {
        let window = self.jitter.as_millis() as u64;
        if window == 0 {
            return Duration::ZERO;
        }
        use rand::Rng;
        Duration::from_millis(rand::thread_rng().gen_range(0..window))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY).with_jitter(DEFAULT_JITTER)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        Some(self.base_delay(attempt) + self.jitter())
    }

    fn reset(&mut self) {
        // Delay depends only on the attempt number
    }
}

/// Constant delay between attempts
///
/// # Examples
///
/// ```rust
/// use rentwire_client::{FixedDelay, ReconnectionStrategy};
/// use std::time::Duration;
///
/// let mut fixed = FixedDelay::new(Duration::from_secs(2));
/// assert_eq!(fixed.next_delay(0), fixed.next_delay(7));
/// ```
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Retry after `delay` every time
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Strategy that never reconnects
///
/// The first unexpected close reports exhaustion with zero attempts.
#[derive(Debug, Clone, Copy)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

/// Outcome of asking the scheduler for another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schedule {
    /// Timer armed; `attempt` is the 0-indexed attempt it will run
    Armed { attempt: u32, delay: Duration },
    /// Cap reached or the strategy gave up
    Exhausted { attempts: u32 },
}

/// Attempt counter plus the single pending reconnect timer
pub(crate) struct ReconnectScheduler {
    strategy: Box<dyn ReconnectionStrategy>,
    max_attempts: u32,
    attempts: u32,
    next_ticket: u64,
    pending: Option<(u64, Timer)>,
}

impl ReconnectScheduler {
    pub(crate) fn new(strategy: Box<dyn ReconnectionStrategy>, max_attempts: u32) -> Self {
        Self {
            strategy,
            max_attempts,
            attempts: 0,
            next_ticket: 0,
            pending: None,
        }
    }

    /// Retries scheduled since the last successful open
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm a retry; `fire` receives the timer's ticket when it elapses
    ///
    /// Any timer already pending is cancelled first, so at most one exists.
    pub(crate) fn schedule<F>(&mut self, fire: F) -> Schedule
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        if self.attempts >= self.max_attempts {
            return Schedule::Exhausted {
                attempts: self.attempts,
            };
        }

        let attempt = self.attempts;
        let Some(delay) = self.strategy.next_delay(attempt) else {
            return Schedule::Exhausted {
                attempts: self.attempts,
            };
        };

        self.attempts += 1;
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let timer = Timer::once(delay, move || fire(ticket));
        self.pending = Some((ticket, timer));

        Schedule::Armed { attempt, delay }
    }

    /// Claim the pending timer if `ticket` belongs to it
    ///
    /// Returns false for tickets of cancelled or superseded timers.
    pub(crate) fn take_due(&mut self, ticket: u64) -> bool {
        match self.pending {
            Some((pending, _)) if pending == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the pending timer, if any
    pub(crate) fn cancel(&mut self) {
        if let Some((_, timer)) = self.pending.take() {
            timer.cancel();
        }
    }

    /// Successful open: counter back to zero
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.strategy.reset();
    }
}
