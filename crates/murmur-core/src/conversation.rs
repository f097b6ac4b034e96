//! Per-conversation message lists.
//!
//! A [`ConversationStore`] maps a conversation key (friend id or room id) to
//! the messages of that conversation in arrival order. It has exactly two
//! mutators: [`ConversationStore::hydrate`] for REST snapshots and
//! [`ConversationStore::insert`] for live deliveries.
//!
//! Readers take an [`Arc`] snapshot. Mutation copies the map on write when a
//! snapshot is still held, so a reader never observes a half-applied update.
//!
//! # Invariants
//!
//! - Once a message for a key has been stored, the key maps to a list.
//! - Within one conversation a message id appears at most once. Messages
//!   without an id are always appended.
//! - Lists are never re-sorted; order is arrival order.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use crate::{
    error::MessageError,
    message::{ConversationKey, Message, MessageId, UserId, WireMessage},
};

/// Conversation key to ordered messages.
pub type ConversationMap = BTreeMap<ConversationKey, Vec<Message>>;

/// Which keyspace a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// One-to-one conversation, keyed by the other party's user id.
    Private,
    /// Room conversation, keyed by room id.
    Room,
}

/// Result of [`ConversationStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Message was appended.
    Appended {
        /// Conversation it was appended to.
        key: ConversationKey,
        /// List length after the append.
        len: usize,
    },
    /// A message with the same id was already in the conversation.
    Duplicate {
        /// Conversation that already held the message.
        key: ConversationKey,
        /// The repeated id.
        id: MessageId,
    },
}

impl InsertOutcome {
    /// Conversation the message belongs to.
    pub fn key(&self) -> ConversationKey {
        match self {
            Self::Appended { key, .. } | Self::Duplicate { key, .. } => *key,
        }
    }
}

/// In-memory conversation store for one keyspace and one signed-in user.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    current_user: UserId,
    map: Arc<ConversationMap>,
    seen: HashMap<ConversationKey, HashSet<MessageId>>,
}

impl ConversationStore {
    /// Create an empty store for `current_user`.
    pub fn new(current_user: UserId) -> Self {
        Self { current_user, map: Arc::new(ConversationMap::new()), seen: HashMap::new() }
    }

    /// Signed-in user this store resolves private keys against.
    pub fn current_user(&self) -> UserId {
        self.current_user
    }

    /// Conversation key for a message.
    ///
    /// Rooms are keyed by the recipient (room) id. Private messages are keyed
    /// by the other party: the recipient if the current user sent it,
    /// otherwise the sender.
    pub fn key_for(&self, wire: &WireMessage, kind: ConversationKind) -> ConversationKey {
        match kind {
            ConversationKind::Room => wire.recipient_id,
            ConversationKind::Private if wire.sender_id == self.current_user => wire.recipient_id,
            ConversationKind::Private => wire.sender_id,
        }
    }

    /// Replace the listed conversations with a snapshot.
    ///
    /// Keys absent from `snapshot` are left alone. Repeated ids inside one
    /// snapshot list keep their first occurrence.
    ///
    /// # Errors
    ///
    /// - `MessageError::InvalidTimestamp` if any message fails to convert. The
    ///   store is unchanged in that case.
    pub fn hydrate<I, L>(&mut self, snapshot: I) -> Result<(), MessageError>
    where
        I: IntoIterator<Item = (ConversationKey, L)>,
        L: IntoIterator<Item = WireMessage>,
    {
        let mut converted = Vec::new();
        for (key, wires) in snapshot {
            let mut ids = HashSet::new();
            let mut messages = Vec::new();
            for wire in wires {
                let message = Message::from_wire(wire)?;
                if message.id.is_none_or(|id| ids.insert(id)) {
                    messages.push(message);
                }
            }
            converted.push((key, messages, ids));
        }

        let map = Arc::make_mut(&mut self.map);
        for (key, messages, ids) in converted {
            tracing::debug!(key, count = messages.len(), "hydrated conversation");
            map.insert(key, messages);
            self.seen.insert(key, ids);
        }
        Ok(())
    }

    /// Append one delivered message to its conversation.
    ///
    /// # Errors
    ///
    /// - `MessageError::InvalidTimestamp` if the timestamp cannot be parsed.
    ///   Nothing is stored.
    pub fn insert(
        &mut self,
        wire: WireMessage,
        kind: ConversationKind,
    ) -> Result<InsertOutcome, MessageError> {
        let key = self.key_for(&wire, kind);
        let message = Message::from_wire(wire)?;

        if let Some(id) = message.id
            && !self.seen.entry(key).or_default().insert(id)
        {
            tracing::debug!(key, id, "dropping duplicate message");
            return Ok(InsertOutcome::Duplicate { key, id });
        }

        let list = Arc::make_mut(&mut self.map).entry(key).or_default();
        list.push(message);
        Ok(InsertOutcome::Appended { key, len: list.len() })
    }

    /// Consistent snapshot of every conversation.
    pub fn snapshot(&self) -> Arc<ConversationMap> {
        Arc::clone(&self.map)
    }

    /// Messages of one conversation, oldest arrival first. Empty if unknown.
    pub fn messages(&self, key: ConversationKey) -> &[Message] {
        self.map.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no conversation has any message yet.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
