//! Session input events.
//!
//! [`SessionEvent`] is everything that drives the [`crate::Session`] state
//! machine. Events come from three places:
//! - Fetcher and REST task completions, posted by the runtime.
//! - Push channel deliveries and connection changes.
//! - User commands read by the [`crate::Driver`].

use murmur_client::MessageSnapshot;
use murmur_core::{
    ConversationKind, Friend, Recipient, RequestDirection, RequestResponse, RequestsPayload,
    RetryState, Room, SendRequestOutcome, User, WireMessage,
};

use crate::Resource;

/// Events processed by the session state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The current user was resolved. Starts a fresh session.
    Authenticated(User),

    /// Friend list fetched.
    FriendsLoaded(Vec<Friend>),

    /// Room list fetched.
    RoomsLoaded(Vec<Room>),

    /// Pending requests fetched.
    RequestsLoaded(RequestsPayload),

    /// Private message snapshot fetched.
    PrivateMessagesLoaded(MessageSnapshot),

    /// Room message snapshot fetched.
    RoomMessagesLoaded(MessageSnapshot),

    /// A fetcher's retry state changed.
    RetryChanged {
        /// Resource the fetcher loads.
        resource: Resource,
        /// New retry state.
        state: RetryState,
    },

    /// A fetcher reached its retry ceiling.
    FetchGaveUp(Resource),

    /// Push channel subscribed.
    PushConnected,

    /// Push channel lost its socket.
    PushDisconnected,

    /// A message delivered over the push channel.
    PushMessage {
        /// Which store it belongs to.
        kind: ConversationKind,
        /// The delivered message.
        message: WireMessage,
    },

    /// Error text from the push error queue.
    PushError(String),

    /// A REST call answered 401.
    Unauthorized,

    /// A response to a pending request went through.
    RequestResolved {
        /// Request id.
        id: u64,
        /// Direction the request was pending in.
        direction: RequestDirection,
        /// What was done.
        response: RequestResponse,
        /// Username of the new friend, when accepting.
        friend: Option<String>,
    },

    /// A friend request was sent (or refused).
    FriendRequestSent {
        /// Who it was addressed to.
        username: String,
        /// Interpreted result.
        outcome: SendRequestOutcome,
    },

    /// A user-initiated REST call failed.
    CommandFailed(String),

    /// Open a conversation.
    Select(Recipient),

    /// Input from the user.
    Command(UserCommand),
}

/// Commands typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Open the friend or room with this name. Friends win on a tie.
    Open(String),
    /// Send text to the open conversation.
    Send(String),
    /// Send a friend request.
    AddFriend(String),
    /// Answer or withdraw a pending request.
    Respond {
        /// Request id.
        id: u64,
        /// What to do with it.
        response: RequestResponse,
    },
    /// Leave the session.
    Quit,
}
