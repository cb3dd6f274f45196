//! Pacing controller - minimum spacing between provider calls
//!
//! Backed by a governor GCRA limiter with a burst of one: the first call is
//! admitted immediately and every later call no sooner than `min_interval`
//! after the previous admission. Spacing is measured between call starts, so
//! a slow provider response does not add to the delay.

use std::time::Duration;

use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Result of waiting for pacing clearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paced {
    Ready,
    Cancelled,
}

pub struct PacingController {
    min_interval: Duration,
    /// `None` when pacing is disabled (zero interval)
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl PacingController {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(RateLimiter::direct);
        Self { min_interval, limiter }
    }

    /// Controller that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next provider call may start.
    ///
    /// Returns [`Paced::Cancelled`] as soon as `cancel` fires, whether it was
    /// already cancelled or fires during the wait.
    pub async fn before_next_call(&self, cancel: &CancellationToken) -> Paced {
        if cancel.is_cancelled() {
            return Paced::Cancelled;
        }

        let Some(limiter) = &self.limiter else {
            return Paced::Ready;
        };

        if limiter.check().is_ok() {
            return Paced::Ready;
        }

        trace!(min_interval_ms = self.min_interval.as_millis() as u64, "Waiting for pacing clearance");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Paced::Cancelled,
            _ = limiter.until_ready() => Paced::Ready,
        }
    }
}

impl Default for PacingController {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
