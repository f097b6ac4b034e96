//! Async driver for [`RetryMachine`].
//!
//! [`ReconnectingFetcher`] runs a caller-supplied probe until it succeeds or
//! the retry ceiling is reached. The retry policy lives entirely in the pure
//! machine; this module only executes its actions: it runs the probe, sleeps
//! through the injected [`Environment`], forwards notifications and invokes
//! the callbacks.
//!
//! # Cancellation
//!
//! Every loop carries the generation it was started in. `stop()` bumps the
//! generation and wakes any pending backoff sleep. A loop whose generation is
//! stale exits at its next step, and the result of a probe that was in flight
//! is discarded. The probe itself is never cancelled.

use std::{
    fmt::Display,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use murmur_core::{
    Environment, Notifier, RetryAction, RetryConfig, RetryError, RetryMachine, RetryState,
};
use tokio::sync::{Notify, watch};

struct Shared {
    machine: RetryMachine,
    generation: u64,
}

struct Inner<E> {
    env: E,
    resource: String,
    notifier: Arc<dyn Notifier>,
    shared: Mutex<Shared>,
    state: watch::Sender<RetryState>,
    cancel: Notify,
}

/// Retrying fetcher for one resource.
///
/// Cheap to clone; clones drive the same loop. At most one loop is active per
/// fetcher.
pub struct ReconnectingFetcher<E: Environment> {
    inner: Arc<Inner<E>>,
}

impl<E: Environment> Clone for ReconnectingFetcher<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

enum Step {
    Attempt,
    Backoff(Duration),
}

impl<E: Environment> ReconnectingFetcher<E> {
    /// Create an idle fetcher. `resource` names it in logs.
    pub fn new(
        env: E,
        config: RetryConfig,
        notifier: Arc<dyn Notifier>,
        resource: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(RetryState::IDLE);
        let inner = Inner {
            env,
            resource: resource.into(),
            notifier,
            shared: Mutex::new(Shared { machine: RetryMachine::new(config), generation: 0 }),
            state,
            cancel: Notify::new(),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Current retry state.
    pub fn state(&self) -> RetryState {
        self.inner.lock().machine.state()
    }

    /// Receiver that observes every retry state change.
    pub fn subscribe(&self) -> watch::Receiver<RetryState> {
        self.inner.state.subscribe()
    }

    /// Start a retry loop on the current tokio runtime.
    ///
    /// Returns `false` (and does nothing) if a loop is already active.
    /// `on_success` receives the first successful probe result; `on_give_up`
    /// runs once when the ceiling is reached. Probe errors are logged and
    /// never surface.
    pub fn start<P, Fut, T, Err, S, G>(&self, probe: P, on_success: S, on_give_up: G) -> bool
    where
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Err>> + Send + 'static,
        Err: Display + 'static,
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        G: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut shared = self.inner.lock();
            if shared.machine.start().is_empty() {
                tracing::debug!(resource = %self.inner.resource, "retry loop already active");
                return false;
            }
            shared.generation += 1;
            shared.generation
        };
        self.inner.publish();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run(generation, probe, on_success, on_give_up));
        true
    }

    /// Cancel a pending retry and reset to idle. Safe when idle.
    pub fn stop(&self) {
        {
            let mut shared = self.inner.lock();
            shared.machine.stop();
            shared.generation += 1;
        }
        self.inner.publish();
        self.inner.cancel.notify_waiters();
        tracing::debug!(resource = %self.inner.resource, "retry loop stopped");
    }
}

impl<E: Environment> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        let state = self.lock().machine.state();
        self.state.send_replace(state);
    }

    /// Feed an outcome to the machine if `generation` is still current.
    fn advance(
        &self,
        generation: u64,
        feed: impl FnOnce(&mut RetryMachine) -> Result<Vec<RetryAction>, RetryError>,
    ) -> Option<Vec<RetryAction>> {
        let actions = {
            let mut shared = self.lock();
            if shared.generation != generation {
                return None;
            }
            match feed(&mut shared.machine) {
                Ok(actions) => actions,
                Err(e) => {
                    tracing::warn!(resource = %self.resource, error = %e, "retry loop out of sync");
                    return None;
                },
            }
        };
        self.publish();
        Some(actions)
    }

    async fn run<P, Fut, T, Err, S, G>(
        self: Arc<Self>,
        generation: u64,
        mut probe: P,
        on_success: S,
        on_give_up: G,
    ) where
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Err>> + Send,
        Err: Display,
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        G: FnOnce() + Send + 'static,
    {
        let timeout = self.lock().machine.config().attempt_timeout;
        let mut on_success = Some(on_success);
        let mut on_give_up = Some(on_give_up);
        let mut step = Step::Attempt;

        loop {
            let next = match step {
                Step::Attempt => {
                    let outcome = self.attempt(&mut probe, timeout).await;
                    let mut value = None;
                    let actions = self.advance(generation, |machine| match outcome {
                        Ok(result) => {
                            value = Some(result);
                            machine.on_success()
                        },
                        Err(error) => {
                            tracing::debug!(
                                resource = %self.resource,
                                retry_count = machine.state().retry_count,
                                %error,
                                "probe failed"
                            );
                            machine.on_failure()
                        },
                    });
                    let Some(actions) = actions else {
                        tracing::debug!(resource = %self.resource, "discarding stale probe result");
                        return;
                    };
                    self.execute(actions, &mut value, &mut on_success, &mut on_give_up)
                },
                Step::Backoff(delay) => {
                    tokio::select! {
                        () = self.env.sleep(delay) => {},
                        () = self.cancel.notified() => return,
                    }
                    let Some(actions) = self.advance(generation, RetryMachine::on_timer_fired)
                    else {
                        return;
                    };
                    self.execute(actions, &mut None::<T>, &mut on_success, &mut on_give_up)
                },
            };

            match next {
                Some(next) => step = next,
                None => return,
            }
        }
    }

    async fn attempt<P, Fut, T, Err>(
        &self,
        probe: &mut P,
        timeout: Option<Duration>,
    ) -> Result<T, String>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Err>>,
        Err: Display,
    {
        let fut = probe();
        match timeout {
            None => fut.await.map_err(|e| e.to_string()),
            Some(limit) => tokio::select! {
                result = fut => result.map_err(|e| e.to_string()),
                () = self.env.sleep(limit) => Err(format!("timed out after {limit:?}")),
            },
        }
    }

    /// Execute machine actions. Returns the next step, or `None` when the loop
    /// is finished.
    fn execute<T, S, G>(
        &self,
        actions: Vec<RetryAction>,
        value: &mut Option<T>,
        on_success: &mut Option<S>,
        on_give_up: &mut Option<G>,
    ) -> Option<Step>
    where
        S: FnOnce(T),
        G: FnOnce(),
    {
        let mut next = None;
        for action in actions {
            match action {
                RetryAction::Attempt => next = Some(Step::Attempt),
                RetryAction::Schedule { delay } => {
                    tracing::info!(
                        resource = %self.resource,
                        retry_count = self.lock().machine.state().retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "retry scheduled"
                    );
                    next = Some(Step::Backoff(delay));
                },
                RetryAction::Notify(notification) => self.notifier.notify(notification),
                RetryAction::Succeeded => {
                    if let (Some(callback), Some(result)) = (on_success.take(), value.take()) {
                        callback(result);
                    }
                },
                RetryAction::GiveUp => {
                    tracing::warn!(resource = %self.resource, "giving up");
                    if let Some(callback) = on_give_up.take() {
                        callback();
                    }
                },
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use murmur_core::NullNotifier;

    use super::*;
    use crate::system_env::SystemEnv;

    #[tokio::test(start_paused = true)]
    async fn first_try_success_delivers_value() {
        let notifier = Arc::new(NullNotifier);
        let fetcher = ReconnectingFetcher::new(SystemEnv, RetryConfig::default(), notifier, "test");
        let (tx, rx) = tokio::sync::oneshot::channel();

        assert!(fetcher.start(|| async { Ok::<_, String>(7) }, move |v| {
            let _ = tx.send(v);
        }, || {}));
        assert_eq!(rx.await.unwrap(), 7);
        assert_eq!(fetcher.state(), RetryState::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_counts_as_failure() {
        let config = RetryConfig {
            max_retries: 1,
            attempt_timeout: Some(Duration::from_secs(1)),
            ..RetryConfig::default()
        };
        let fetcher = ReconnectingFetcher::new(SystemEnv, config, Arc::new(NullNotifier), "hang");
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let counter = Arc::clone(&calls);
        fetcher.start(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<Result<(), String>>()
            },
            |()| {},
            move || {
                let _ = tx.send(());
            },
        );

        rx.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.state().retry_count, 1);
    }
}
