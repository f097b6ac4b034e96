//! Chat messages: the JSON wire shape and the immutable domain value.
//!
//! Every message, whether it came from a REST snapshot or a push delivery,
//! goes through [`Message::from_wire`]. That is the only place timestamps are
//! parsed, so both sources order identically.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// User identifier.
pub type UserId = u64;

/// Room identifier.
pub type RoomId = u64;

/// Message identifier.
pub type MessageId = u64;

/// Friend id or room id used to bucket messages.
pub type ConversationKey = u64;

/// Message as serialized by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Absent for optimistic or legacy payloads.
    #[serde(default)]
    pub id: Option<MessageId>,
    /// Author id.
    pub sender_id: UserId,
    /// Author display name.
    #[serde(default)]
    pub sender_name: String,
    /// Friend or room id the message was sent to.
    pub recipient_id: u64,
    /// Friend or room display name.
    #[serde(default)]
    pub recipient_name: String,
    /// Message body.
    pub content: String,
    /// ISO-8601 timestamp string.
    pub timestamp: String,
}

/// A converted, immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id, if the payload had one.
    pub id: Option<MessageId>,
    /// Author id.
    pub sender_id: UserId,
    /// Author display name.
    pub sender_name: String,
    /// Friend or room id the message was sent to.
    pub recipient_id: u64,
    /// Friend or room display name.
    pub recipient_name: String,
    /// Message body.
    pub content: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Convert a wire message, parsing its timestamp.
    ///
    /// # Errors
    ///
    /// - `MessageError::InvalidTimestamp` if the timestamp cannot be parsed
    pub fn from_wire(wire: WireMessage) -> Result<Self, MessageError> {
        let timestamp = parse_timestamp(&wire.timestamp)?;
        Ok(Self {
            id: wire.id,
            sender_id: wire.sender_id,
            sender_name: wire.sender_name,
            recipient_id: wire.recipient_id,
            recipient_name: wire.recipient_name,
            content: wire.content,
            timestamp,
        })
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Self::from_wire(wire)
    }
}

/// Parse a wire timestamp.
///
/// Accepts RFC 3339 (`2024-07-04T14:43:00Z`, `...+02:00`). A date-time without
/// an offset (`2024-07-04T14:43:00`, optionally with fractional seconds) is
/// taken as UTC.
///
/// # Errors
///
/// - `MessageError::InvalidTimestamp` for anything else
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, MessageError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc())
        .map_err(|_| MessageError::InvalidTimestamp { raw: raw.to_owned() })
}
