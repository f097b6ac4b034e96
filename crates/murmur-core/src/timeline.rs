//! Presentation helpers for a conversation's message list.
//!
//! Consecutive messages from one sender are shown under a single header;
//! headers carry a label relative to "now". Both helpers are pure and take
//! the current time as an argument.

use chrono::{DateTime, Datelike, Days, Utc};

use crate::message::Message;

/// A header starts a new group once this many whole minutes have passed
/// since the group's first message.
pub const GROUP_WINDOW_MINUTES: i64 = 5;

/// Consecutive messages shown under one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageGroup<'a> {
    /// Sender shown in the header.
    pub sender_name: &'a str,
    /// Timestamp shown in the header (the first message's).
    pub started_at: DateTime<Utc>,
    /// Messages in the group, in list order.
    pub messages: &'a [Message],
}

/// Split messages into header groups.
///
/// A new group starts when the sender name changes or when more than
/// [`GROUP_WINDOW_MINUTES`] whole minutes separate a message from the first
/// message of the current group.
pub fn group_messages(messages: &[Message]) -> Vec<MessageGroup<'_>> {
    let mut groups = Vec::new();
    let mut start = 0;

    for (index, message) in messages.iter().enumerate().skip(1) {
        let head = &messages[start];
        let gap = (message.timestamp - head.timestamp).num_minutes();
        if message.sender_name != head.sender_name || gap > GROUP_WINDOW_MINUTES {
            groups.push(group(&messages[start..index]));
            start = index;
        }
    }

    if start < messages.len() {
        groups.push(group(&messages[start..]));
    }
    groups
}

fn group(messages: &[Message]) -> MessageGroup<'_> {
    let head = &messages[0];
    MessageGroup { sender_name: &head.sender_name, started_at: head.timestamp, messages }
}

/// Label for a message timestamp relative to `now`.
///
/// | age | label |
/// | --- | --- |
/// | under 1 minute (or in the future) | `just now` |
/// | under 60 minutes | `12m ago` |
/// | up to 70 minutes | `an hr ago` |
/// | same day | `14:43` |
/// | previous day | `Yesterday 14:43` |
/// | same year | `Jul 4 14:43` |
/// | older | `Jul 4, 2024` |
pub fn relative_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();

    if minutes < 1 {
        return "just now".to_owned();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    if minutes <= 70 {
        return "an hr ago".to_owned();
    }

    let day = timestamp.date_naive();
    let today = now.date_naive();

    if day == today {
        timestamp.format("%H:%M").to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        timestamp.format("Yesterday %H:%M").to_string()
    } else if day.year() == today.year() {
        timestamp.format("%b %-d %H:%M").to_string()
    } else {
        timestamp.format("%b %-d, %Y").to_string()
    }
}
