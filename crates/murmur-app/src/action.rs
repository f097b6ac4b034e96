//! Session side effects.
//!
//! [`SessionAction`]s are produced by the [`crate::Session`] state machine for
//! the [`crate::Runtime`] to execute.

use murmur_core::{FriendRequest, Notification, Recipient, RequestResponse};

use crate::Resource;

/// Actions produced by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Redraw through the driver.
    Render,

    /// Show a notification.
    Notify(Notification),

    /// Start the retrying fetcher for a resource.
    Fetch(Resource),

    /// Open the push channel.
    ConnectPush,

    /// Publish a text message over the push channel.
    Publish {
        /// Friend or room.
        recipient: Recipient,
        /// Message text.
        content: String,
    },

    /// `POST` a friend request.
    SendFriendRequest(String),

    /// Answer or withdraw a pending request.
    RespondToRequest {
        /// The pending request.
        request: FriendRequest,
        /// What to do with it.
        response: RequestResponse,
    },

    /// Tear everything down after the session expired.
    SignOut,

    /// Stop the runtime.
    Quit,
}
