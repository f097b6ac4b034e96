//! Core logic for the murmur chat client
//!
//! Sans-IO building blocks shared by every frontend: no sockets, no runtime,
//! no clock. Time is injected through [`Environment`], and the stateful parts
//! return actions instead of performing effects.
//!
//! # Components
//!
//! - [`RetryMachine`]: capped exponential-backoff retry state machine
//! - [`ConversationStore`]: per-conversation message lists fed by REST
//!   snapshots and push deliveries
//! - [`FriendRequests`] / [`SendRequestOutcome`]: friend-request bookkeeping
//! - [`Notification`] / [`Notifier`] / [`ToastQueue`]: user-visible messages
//! - [`timeline`]: grouping and relative time labels for message lists
//! - [`ApiError`]: the single interpretation of REST status codes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation;
pub mod env;
pub mod error;
pub mod friends;
pub mod message;
pub mod notification;
pub mod recipient;
pub mod retry;
pub mod timeline;

pub use conversation::{ConversationKind, ConversationMap, ConversationStore, InsertOutcome};
pub use env::Environment;
pub use error::{ApiError, MessageError};
pub use friends::{
    ConflictBody, ConflictStatus, FriendRequest, FriendRequests, RequestData, RequestDirection,
    RequestResponse, RequestsPayload, SendRequestOutcome,
};
pub use message::{ConversationKey, Message, MessageId, RoomId, UserId, WireMessage};
pub use notification::{Notification, Notifier, NullNotifier, Severity, ToastQueue, TracingNotifier};
pub use recipient::{Friend, FriendStatus, Recipient, Room, RoomType, User};
pub use retry::{RetryAction, RetryConfig, RetryError, RetryMachine, RetryPhase, RetryState};
