//! Capped exponential-backoff retry state machine.
//!
//! [`RetryMachine`] decides what a retry loop does next; it never sleeps,
//! spawns or calls the probe itself. The driver (the async fetcher in
//! `murmur-client`, or a test) executes the returned [`RetryAction`]s and
//! reports outcomes back. Time only enters as the delay inside
//! [`RetryAction::Schedule`], so the whole policy is testable without timers.
//!
//! # State Machine
//!
//! ```text
//!            start            failure (count < max)
//! ┌──────┐ ────────> ┌────────────┐ ─────────────────> ┌──────────────────┐
//! │ Idle │           │ Attempting │                    │ Backoff(delay)   │
//! └──────┘ <──────── └────────────┘ <───────────────── └──────────────────┘
//!    ^      success        │             timer fired
//!    │                     │ failure (count >= max)
//!    │ start/stop          ↓
//!    └──────────────  ┌─────────┐
//!                     │ GivenUp │
//!                     └─────────┘
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::notification::Notification;

/// Attempts allowed before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Base of the exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Display time of the "retrying in background" warning.
pub const RETRY_WARNING_DURATION: Duration = Duration::from_millis(3000);

/// Shown when a probe succeeds after at least one failure.
pub const RESTORED_MESSAGE: &str = "Connection restored!";

/// Shown on the first failure of a loop.
pub const RETRYING_MESSAGE: &str = "Connection issues detected. Retrying in background...";

/// Shown when the retry ceiling is reached.
pub const FAILED_MESSAGE: &str = "Connection failed";

/// Retry loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Failures tolerated before giving up (at least 1).
    pub max_retries: u32,
    /// Base delay, doubled per failure.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Emit user-visible notifications. When `false` the loop is silent.
    pub notifications_enabled: bool,
    /// Per-attempt timeout enforced by the driver. `None` waits forever.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            notifications_enabled: true,
            attempt_timeout: None,
        }
    }
}

impl RetryConfig {
    /// Backoff delay after `retry_count` failures:
    /// `min(base_delay * 2^retry_count, max_delay)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let multiplier = 1_u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
    }

    /// Disable notifications.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.notifications_enabled = false;
        self
    }
}

/// Observable retry progress, published for UI consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryState {
    /// A loop is active (attempting or waiting to retry).
    pub is_retrying: bool,
    /// Consecutive failures in the current (or last) loop.
    pub retry_count: u32,
    /// Seconds until the next attempt, rounded up. Zero when not waiting.
    pub next_retry_in_secs: u64,
}

impl RetryState {
    /// Idle state: no loop, no failures.
    pub const IDLE: Self = Self { is_retrying: false, retry_count: 0, next_retry_in_secs: 0 };
}

/// Phase of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// No loop running.
    Idle,
    /// Probe in flight.
    Attempting,
    /// Waiting for the next attempt.
    Backoff {
        /// Delay that was scheduled.
        delay: Duration,
    },
    /// Retry ceiling reached; no further attempts.
    GivenUp,
}

/// Actions returned by the retry machine for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    /// Run the probe now and report the outcome.
    Attempt,
    /// Wait `delay`, then call [`RetryMachine::on_timer_fired`].
    Schedule {
        /// Backoff delay.
        delay: Duration,
    },
    /// Show a notification.
    Notify(Notification),
    /// Deliver the probe result to the success callback.
    Succeeded,
    /// Invoke the give-up callback. Emitted at most once per loop.
    GiveUp,
}

/// Errors from feeding an outcome the machine did not ask for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Outcome reported in the wrong phase (e.g. a probe result after `stop`).
    #[error("invalid retry transition: cannot {operation} from {phase:?}")]
    InvalidState {
        /// Phase when the error occurred.
        phase: RetryPhase,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Retry state machine.
///
/// Pure: no I/O, no clock. One machine backs one fetcher, so at most one loop
/// is live per machine.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    config: RetryConfig,
    phase: RetryPhase,
    state: RetryState,
}

impl RetryMachine {
    /// Create an idle machine. `max_retries` is clamped to at least 1.
    pub fn new(mut config: RetryConfig) -> Self {
        config.max_retries = config.max_retries.max(1);
        Self { config, phase: RetryPhase::Idle, state: RetryState::IDLE }
    }

    /// Current configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Current observable state.
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Start a loop.
    ///
    /// Returns no actions (a no-op) while a loop is already active.
    pub fn start(&mut self) -> Vec<RetryAction> {
        if self.state.is_retrying {
            return Vec::new();
        }

        self.phase = RetryPhase::Attempting;
        self.state = RetryState { is_retrying: true, retry_count: 0, next_retry_in_secs: 0 };
        vec![RetryAction::Attempt]
    }

    /// Report a successful probe.
    ///
    /// # Errors
    ///
    /// - `RetryError::InvalidState` if no attempt is in flight
    pub fn on_success(&mut self) -> Result<Vec<RetryAction>, RetryError> {
        self.expect_phase(RetryPhase::Attempting, "on_success")?;

        let recovered = self.state.retry_count > 0;
        self.phase = RetryPhase::Idle;
        self.state = RetryState::IDLE;

        let mut actions = Vec::with_capacity(2);
        if recovered && self.config.notifications_enabled {
            actions.push(RetryAction::Notify(Notification::success(RESTORED_MESSAGE)));
        }
        actions.push(RetryAction::Succeeded);
        Ok(actions)
    }

    /// Report a failed probe.
    ///
    /// # Errors
    ///
    /// - `RetryError::InvalidState` if no attempt is in flight
    pub fn on_failure(&mut self) -> Result<Vec<RetryAction>, RetryError> {
        self.expect_phase(RetryPhase::Attempting, "on_failure")?;

        let retry_count = self.state.retry_count + 1;

        if retry_count >= self.config.max_retries {
            self.phase = RetryPhase::GivenUp;
            self.state = RetryState { is_retrying: false, retry_count, next_retry_in_secs: 0 };

            let mut actions = Vec::with_capacity(2);
            if self.config.notifications_enabled {
                actions.push(RetryAction::Notify(Notification::error(FAILED_MESSAGE)));
            }
            actions.push(RetryAction::GiveUp);
            return Ok(actions);
        }

        let mut actions = Vec::with_capacity(2);
        if retry_count == 1 && self.config.notifications_enabled {
            actions.push(RetryAction::Notify(
                Notification::warning(RETRYING_MESSAGE).with_duration(RETRY_WARNING_DURATION),
            ));
        }

        let delay = self.config.delay_for(retry_count);
        self.phase = RetryPhase::Backoff { delay };
        self.state = RetryState {
            is_retrying: true,
            retry_count,
            next_retry_in_secs: delay.as_millis().div_ceil(1000) as u64,
        };
        actions.push(RetryAction::Schedule { delay });
        Ok(actions)
    }

    /// Report that the scheduled backoff elapsed.
    ///
    /// # Errors
    ///
    /// - `RetryError::InvalidState` if no backoff is pending
    pub fn on_timer_fired(&mut self) -> Result<Vec<RetryAction>, RetryError> {
        if !matches!(self.phase, RetryPhase::Backoff { .. }) {
            return Err(RetryError::InvalidState { phase: self.phase, operation: "on_timer_fired" });
        }

        self.phase = RetryPhase::Attempting;
        self.state.next_retry_in_secs = 0;
        Ok(vec![RetryAction::Attempt])
    }

    /// Stop the loop and reset to idle. Safe to call at any time.
    ///
    /// A pending schedule becomes invalid: a later `on_timer_fired`, or the
    /// outcome of a probe that was in flight, is rejected.
    pub fn stop(&mut self) {
        self.phase = RetryPhase::Idle;
        self.state = RetryState::IDLE;
    }

    fn expect_phase(
        &self,
        expected: RetryPhase,
        operation: &'static str,
    ) -> Result<(), RetryError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RetryError::InvalidState { phase: self.phase, operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Severity;

    fn notifications(actions: &[RetryAction]) -> Vec<&Notification> {
        actions
            .iter()
            .filter_map(|action| match action {
                RetryAction::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(config.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(config.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn delay_keeps_doubling_below_a_large_cap() {
        let config = RetryConfig {
            max_retries: 30,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_secs(24 * 60 * 60),
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for(25), Duration::from_millis(1 << 25));
        assert_eq!(config.delay_for(63), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.delay_for(64), Duration::from_secs(24 * 60 * 60));

        let mut machine = RetryMachine::new(config);
        machine.start();
        let mut last = Vec::new();
        for _ in 0..25 {
            last = machine.on_failure().unwrap();
            machine.on_timer_fired().unwrap();
        }
        assert_eq!(last, vec![RetryAction::Schedule { delay: Duration::from_millis(1 << 25) }]);
    }

    #[test]
    fn start_resets_and_requests_attempt() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        assert_eq!(machine.start(), vec![RetryAction::Attempt]);
        assert_eq!(
            machine.state(),
            RetryState { is_retrying: true, retry_count: 0, next_retry_in_secs: 0 }
        );
        assert_eq!(machine.phase(), RetryPhase::Attempting);
    }

    #[test]
    fn start_while_retrying_is_noop() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        machine.start();
        machine.on_failure().unwrap();
        let before = machine.state();

        assert!(machine.start().is_empty());
        assert_eq!(machine.state(), before);
    }

    #[test]
    fn first_failure_warns_once_and_schedules() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        machine.start();

        let actions = machine.on_failure().unwrap();
        let warned = notifications(&actions);
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].severity, Severity::Warning);
        assert_eq!(warned[0].duration, RETRY_WARNING_DURATION);
        assert_eq!(
            actions.last(),
            Some(&RetryAction::Schedule { delay: Duration::from_millis(2000) })
        );
        assert_eq!(
            machine.state(),
            RetryState { is_retrying: true, retry_count: 1, next_retry_in_secs: 2 }
        );

        machine.on_timer_fired().unwrap();
        let actions = machine.on_failure().unwrap();
        assert!(notifications(&actions).is_empty());
        assert_eq!(actions, vec![RetryAction::Schedule { delay: Duration::from_millis(4000) }]);
    }

    #[test]
    fn next_retry_seconds_round_up() {
        let config =
            RetryConfig { base_delay: Duration::from_millis(750), ..RetryConfig::default() };
        let mut machine = RetryMachine::new(config);
        machine.start();
        machine.on_failure().unwrap();
        // 750 * 2 = 1500ms
        assert_eq!(machine.state().next_retry_in_secs, 2);
    }

    #[test]
    fn success_after_failure_reports_restored() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        machine.start();
        machine.on_failure().unwrap();
        machine.on_timer_fired().unwrap();

        let actions = machine.on_success().unwrap();
        assert_eq!(
            actions,
            vec![
                RetryAction::Notify(Notification::success(RESTORED_MESSAGE)),
                RetryAction::Succeeded
            ]
        );
        assert_eq!(machine.state(), RetryState::IDLE);
        assert_eq!(machine.phase(), RetryPhase::Idle);
    }

    #[test]
    fn first_try_success_is_silent() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        machine.start();
        assert_eq!(machine.on_success().unwrap(), vec![RetryAction::Succeeded]);
    }

    #[test]
    fn gives_up_at_ceiling_and_keeps_count() {
        let config = RetryConfig { max_retries: 2, ..RetryConfig::default() };
        let mut machine = RetryMachine::new(config);
        machine.start();
        machine.on_failure().unwrap();
        machine.on_timer_fired().unwrap();

        let actions = machine.on_failure().unwrap();
        assert_eq!(
            actions,
            vec![RetryAction::Notify(Notification::error(FAILED_MESSAGE)), RetryAction::GiveUp]
        );
        assert_eq!(
            machine.state(),
            RetryState { is_retrying: false, retry_count: 2, next_retry_in_secs: 0 }
        );
        assert_eq!(machine.phase(), RetryPhase::GivenUp);
        assert!(machine.on_timer_fired().is_err());
    }

    #[test]
    fn silent_config_emits_no_notifications() {
        let mut machine =
            RetryMachine::new(RetryConfig { max_retries: 2, ..RetryConfig::default() }.silent());
        machine.start();
        let mut all = machine.on_failure().unwrap();
        all.extend(machine.on_timer_fired().unwrap());
        all.extend(machine.on_failure().unwrap());
        assert!(notifications(&all).is_empty());
        assert_eq!(all.last(), Some(&RetryAction::GiveUp));
    }

    #[test]
    fn stop_resets_and_rejects_stale_outcomes() {
        let mut machine = RetryMachine::new(RetryConfig::default());
        machine.start();
        machine.on_failure().unwrap();

        machine.stop();
        assert_eq!(machine.state(), RetryState::IDLE);
        assert!(matches!(machine.on_timer_fired(), Err(RetryError::InvalidState { .. })));
        assert!(machine.on_success().is_err());

        // Stopping an idle machine is fine.
        machine.stop();
        assert_eq!(machine.start(), vec![RetryAction::Attempt]);
    }

    #[test]
    fn zero_max_retries_is_clamped() {
        let config = RetryConfig { max_retries: 0, ..RetryConfig::default() };
        let mut machine = RetryMachine::new(config);
        machine.start();
        let actions = machine.on_failure().unwrap();
        assert_eq!(actions.last(), Some(&RetryAction::GiveUp));
    }
}
