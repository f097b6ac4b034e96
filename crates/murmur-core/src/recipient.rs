//! Users, friends, rooms and the recipient a message is addressed to.

use serde::{Deserialize, Serialize};

use crate::{
    conversation::ConversationKind,
    message::{ConversationKey, RoomId, UserId},
};

/// Push destination for private messages.
pub const PRIVATE_SEND_DESTINATION: &str = "/app/send-private-messages";

/// Push destination for room messages.
pub const ROOM_SEND_DESTINATION: &str = "/app/send-room-messages";

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
}

/// Presence of a friend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendStatus {
    /// Connected.
    Online,
    /// Not connected.
    #[default]
    Offline,
}

/// An accepted friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    /// Friend's user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Presence.
    #[serde(default)]
    pub status: FriendStatus,
}

/// Room visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    /// Anyone can join.
    #[default]
    Public,
    /// Invite only.
    Private,
}

/// A chat room the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Visibility.
    #[serde(rename = "type", default)]
    pub room_type: RoomType,
    /// The user's role in the room (e.g. `OWNER`, `MEMBER`).
    #[serde(default)]
    pub role: String,
}

/// Who a message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Private conversation with a friend.
    Friend(Friend),
    /// Room conversation.
    Room(Room),
}

impl Recipient {
    /// Conversation key of this recipient.
    pub fn id(&self) -> ConversationKey {
        match self {
            Self::Friend(friend) => friend.id,
            Self::Room(room) => room.id,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Friend(friend) => &friend.name,
            Self::Room(room) => &room.name,
        }
    }

    /// Keyspace the recipient's messages live in.
    pub fn kind(&self) -> ConversationKind {
        match self {
            Self::Friend(_) => ConversationKind::Private,
            Self::Room(_) => ConversationKind::Room,
        }
    }

    /// Push destination used to send to this recipient.
    pub fn send_destination(&self) -> &'static str {
        match self {
            Self::Friend(_) => PRIVATE_SEND_DESTINATION,
            Self::Room(_) => ROOM_SEND_DESTINATION,
        }
    }
}
