//! Production `Environment` backed by the tokio clock.
//!
//! Monotonic time comes from `tokio::time::Instant`, so a runtime started with
//! paused time (`#[tokio::test(start_paused = true)]`) drives `SystemEnv`
//! deterministically: sleeps auto-advance and `now()` follows.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use murmur_core::env::Environment;

/// Production environment using tokio time and the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
