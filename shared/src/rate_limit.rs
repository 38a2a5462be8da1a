//! Per-unit event rate limiter.
//!
//! Caps the number of error events one unit of work (request, command or
//! job) may send. The counter is owned by the unit's scope and discarded
//! with it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Message of the synthetic event queued when the limit is reached.
pub const RATE_LIMIT_MESSAGE: &str =
    "Log event discarded due to rate limit exceeded; future log events will not be captured.";

/// Outcome of [`RateLimitState::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Send the event.
    Accept,
    /// Drop the event and send the one-off rate limit notification instead.
    Warn,
    /// Drop the event silently.
    Drop,
}

/// Event counter of one unit of work.
///
/// Lock-free, so one state may be shared across tasks of the same unit.
///
/// # Example
///
/// ```
/// use shared::rate_limit::{Decision, RateLimitState};
///
/// let state = RateLimitState::new(1);
/// assert_eq!(state.admit(), Decision::Accept);
/// assert_eq!(state.admit(), Decision::Warn);
/// assert_eq!(state.admit(), Decision::Drop);
/// assert_eq!(state.count(), 3);
/// ```
#[derive(Debug, Default)]
pub struct RateLimitState {
    /// Number of `admit` calls so far.
    count: AtomicU64,
    /// Maximum accepted events, 0 for unlimited.
    limit: u64,
}

impl RateLimitState {
    /// Creates a fresh counter.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            count: AtomicU64::new(0),
            limit,
        }
    }

    /// Counts one event and decides its fate.
    ///
    /// The counter increments on every call, so the warn transition happens
    /// exactly once.
    pub fn admit(&self) -> Decision {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        if self.limit == 0 || previous < self.limit {
            Decision::Accept
        } else if previous == self.limit {
            Decision::Warn
        } else {
            Decision::Drop
        }
    }

    /// Returns the number of `admit` calls so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the configured limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }
}
