//! User-visible notifications (toasts).
//!
//! The client never renders anything itself. Components that need to tell
//! the user something (retry progress, friend-request results, push errors)
//! hand a [`Notification`] to a [`Notifier`], which is whatever sink the
//! frontend provides. [`ToastQueue`] is the bookkeeping a frontend needs to
//! show stacked toasts that expire.

use std::{fmt, ops::Sub, sync::Arc, time::Duration};

/// Default display time for a notification.
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Something succeeded (e.g. connection restored).
    Success,
    /// Something failed permanently.
    Error,
    /// Degraded but still working.
    Warning,
    /// Plain information.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(label)
    }
}

/// A message for the user with a severity and a display duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Text shown to the user.
    pub message: String,
    /// Severity (drives styling).
    pub severity: Severity,
    /// How long the notification stays visible.
    pub duration: Duration,
}

impl Notification {
    /// Create a notification with the default duration.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self { message: message.into(), severity, duration: DEFAULT_NOTIFICATION_DURATION }
    }

    /// Success notification.
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    /// Error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }

    /// Warning notification.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Informational notification.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Override the display duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Sink for user-visible notifications.
///
/// Implementations must not block: notifiers are called from inside retry
/// loops and push handlers.
pub trait Notifier: Send + Sync {
    /// Deliver a notification to the user.
    fn notify(&self, notification: Notification);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Notifier that writes notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification { message, severity, .. } = notification;
        match severity {
            Severity::Error => tracing::error!(%severity, "{message}"),
            Severity::Warning => tracing::warn!(%severity, "{message}"),
            Severity::Success | Severity::Info => tracing::info!(%severity, "{message}"),
        }
    }
}

/// Notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast<I> {
    /// Queue-unique identifier, used to dismiss the toast.
    pub id: u64,
    /// The notification being shown.
    pub notification: Notification,
    /// When the toast was pushed.
    pub shown_at: I,
}

/// Stack of visible toasts.
///
/// Ids are assigned sequentially starting at 1 and never reused within one
/// queue.
#[derive(Debug, Clone)]
pub struct ToastQueue<I> {
    next_id: u64,
    toasts: Vec<Toast<I>>,
}

impl<I> Default for ToastQueue<I> {
    fn default() -> Self {
        Self { next_id: 1, toasts: Vec::new() }
    }
}

impl<I> ToastQueue<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notification. Returns the toast id.
    pub fn push(&mut self, notification: Notification, now: I) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.toasts.push(Toast { id, notification, shown_at: now });
        id
    }

    /// Close a toast early. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    /// Remove every toast whose duration has elapsed and return them.
    pub fn expire(&mut self, now: I) -> Vec<Toast<I>> {
        let (expired, active): (Vec<_>, Vec<_>) = std::mem::take(&mut self.toasts)
            .into_iter()
            .partition(|toast| now - toast.shown_at >= toast.notification.duration);
        self.toasts = active;
        expired
    }

    /// Toasts currently visible, oldest first.
    pub fn active(&self) -> &[Toast<I>] {
        &self.toasts
    }
}
