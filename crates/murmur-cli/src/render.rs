//! Plain-text formatting of session data.

use chrono::{DateTime, Utc};
use murmur_core::{
    ConversationKind, FriendRequest, Message, RequestDirection, Room, RoomType, UserId,
    timeline::{group_messages, relative_label},
};

/// Display name of the conversation a message belongs to, from the point of
/// view of `current_user`.
pub fn conversation_name(message: &Message, kind: ConversationKind, current_user: UserId) -> &str {
    match kind {
        ConversationKind::Room => &message.recipient_name,
        ConversationKind::Private if message.sender_id == current_user => &message.recipient_name,
        ConversationKind::Private => &message.sender_name,
    }
}

/// Grouped history: a `sender · time` header per group, then its messages.
pub fn history(messages: &[Message], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();
    for group in group_messages(messages) {
        lines.push(format!("{} · {}", group.sender_name, relative_label(group.started_at, now)));
        lines.extend(group.messages.iter().map(|message| format!("  {}", message.content)));
    }
    lines
}

/// One live message. `conversation` is set when it is not the open one.
pub fn live_line(message: &Message, conversation: Option<&str>) -> String {
    match conversation {
        Some(name) => format!("[{name}] {}: {}", message.sender_name, message.content),
        None => format!("{}: {}", message.sender_name, message.content),
    }
}

/// A pending request with the commands that apply to it.
pub fn request_line(request: &FriendRequest) -> String {
    let id = request.id;
    match request.direction {
        RequestDirection::Incoming => {
            format!("#{id} from {} (/accept {id}, /reject {id}, /block {id})", request.username)
        },
        RequestDirection::Outgoing => format!("#{id} to {} (/delete {id})", request.username),
    }
}

/// A room summary.
pub fn room_line(room: &Room) -> String {
    let visibility = match room.room_type {
        RoomType::Public => "public",
        RoomType::Private => "private",
    };
    let mut line = format!("#{} {} [{visibility}]", room.id, room.name);
    if !room.role.is_empty() {
        line.push_str(&format!(" {}", room.role.to_lowercase()));
    }
    if !room.description.is_empty() {
        line.push_str(&format!(" - {}", room.description));
    }
    line
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn message(sender: u64, name: &str, content: &str, minute: u32) -> Message {
        Message {
            id: None,
            sender_id: sender,
            sender_name: name.into(),
            recipient_id: 7,
            recipient_name: "ann".into(),
            content: content.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn history_groups_consecutive_senders() {
        let messages = [
            message(42, "bob", "hi", 0),
            message(42, "bob", "you there?", 1),
            message(7, "ann", "yes", 2),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 3, 0).unwrap();

        assert_eq!(
            history(&messages, now),
            ["bob · 3m ago", "  hi", "  you there?", "ann · 1m ago", "  yes"]
        );
    }

    #[test]
    fn private_conversation_is_the_other_party() {
        let incoming = message(42, "bob", "hi", 0);
        assert_eq!(conversation_name(&incoming, ConversationKind::Private, 7), "bob");

        let mut outgoing = message(7, "ann", "hi", 0);
        outgoing.recipient_name = "bob".into();
        assert_eq!(conversation_name(&outgoing, ConversationKind::Private, 7), "bob");
        assert_eq!(conversation_name(&outgoing, ConversationKind::Room, 7), "bob");
    }

    #[test]
    fn request_lines_show_applicable_commands() {
        let incoming = FriendRequest {
            id: 3,
            username: "carol".into(),
            direction: RequestDirection::Incoming,
        };
        assert_eq!(request_line(&incoming), "#3 from carol (/accept 3, /reject 3, /block 3)");

        let outgoing =
            FriendRequest { id: 4, username: "dave".into(), direction: RequestDirection::Outgoing };
        assert_eq!(request_line(&outgoing), "#4 to dave (/delete 4)");
    }

    #[test]
    fn room_line_includes_role_and_description() {
        let room = Room {
            id: 300,
            name: "rust".into(),
            description: "crabs".into(),
            room_type: RoomType::Private,
            role: "OWNER".into(),
        };
        assert_eq!(room_line(&room), "#300 rust [private] owner - crabs");
    }
}
