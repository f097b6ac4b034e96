//! Driver trait for abstracting frontend I/O.
//!
//! The [`Driver`] trait decouples the [`crate::Runtime`] from any particular
//! terminal or UI. A frontend supplies user commands and draws the
//! [`Session`]; the runtime owns the network side.

use std::future::Future;

use murmur_core::Notification;

use crate::{Session, UserCommand};

/// Frontend I/O for the session runtime.
///
/// # Implementations
///
/// - **CLI**: reads commands from stdin, prints new messages to stdout
/// - **Tests**: scripted commands, recorded renders
pub trait Driver: Send {
    /// Frontend error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next user command.
    ///
    /// Returns `None` once input is exhausted; the runtime then stops. Must be
    /// cancel safe: the runtime drops the future whenever another source
    /// wins the race.
    fn next_command(
        &mut self,
    ) -> impl Future<Output = Result<Option<UserCommand>, Self::Error>> + Send;

    /// Draw the session.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    fn render(&mut self, session: &Session) -> Result<(), Self::Error>;

    /// Show a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error>;

    /// Release frontend resources.
    fn stop(&mut self);
}
