//! Observable session state types.
//!
//! [`Resource`] names the five REST collections the session hydrates from;
//! [`ResourceStatus`] and [`PushState`] are what a frontend shows while
//! they load.

use std::fmt;

/// A REST collection fetched through its own retrying fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    /// Accepted friends.
    Friends,
    /// Pending friend requests.
    Requests,
    /// Rooms the user belongs to.
    Rooms,
    /// Private message snapshot.
    PrivateMessages,
    /// Room message snapshot.
    RoomMessages,
}

impl Resource {
    /// Every resource, in fetch order.
    pub const ALL: [Self; 5] =
        [Self::Friends, Self::Requests, Self::Rooms, Self::PrivateMessages, Self::RoomMessages];

    /// Short name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friends => "friends",
            Self::Requests => "requests",
            Self::Rooms => "rooms",
            Self::PrivateMessages => "private-messages",
            Self::RoomMessages => "room-messages",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load state of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceStatus {
    /// Not requested in this session.
    #[default]
    Idle,
    /// Fetch in progress (possibly retrying).
    Loading,
    /// Loaded at least once.
    Ready,
    /// Retry ceiling reached; data may be missing.
    Failed,
}

/// Push channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushState {
    /// No live socket.
    #[default]
    Disconnected,
    /// Subscribed and receiving.
    Connected,
}
