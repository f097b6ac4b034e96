//! Environment abstraction for deterministic testing.
//!
//! Decouples client logic from system time. Production code uses the real
//! clock and tokio timers, tests use paused or virtual time, and both run the
//! same retry and presentation code.

use std::{future::Future, ops::Sub, time::Duration};

use chrono::{DateTime, Utc};

/// Abstract environment providing monotonic time, wall-clock time and sleep.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context.
/// - `sleep()` completes no earlier than `duration` after it was called, as
///   measured by `now()`.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses tokio's instant so paused-clock tests drive it; other
    /// environments may use a virtual clock.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time in UTC.
    ///
    /// Only used for presentation (relative message labels). Never used to
    /// order or schedule anything.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait and is only called by
    /// driver code, never by the pure state machines.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
