//! Session state machine.
//!
//! [`Session`] holds everything a signed-in frontend shows: the user, friends,
//! rooms, pending requests, both conversation stores, per-resource load state
//! and the open conversation. It consumes [`SessionEvent`]s and returns
//! [`SessionAction`]s; it never performs I/O.
//!
//! # Lifecycle
//!
//! `Authenticated` starts a session: fresh stores keyed to that user, the push
//! channel, and one fetch per [`Resource`]. `Unauthorized` ends it. Data events
//! arriving outside a session (late fetch results after a sign-out) are
//! dropped.

use std::collections::{BTreeMap, HashSet};

use murmur_core::{
    ConversationKey, ConversationKind, ConversationStore, Friend, FriendRequests, InsertOutcome,
    Message, Notification, Recipient, RequestDirection, RequestResponse, RetryState, Room, User,
};

use crate::{PushState, Resource, ResourceStatus, SessionAction, SessionEvent, UserCommand};

/// Session state machine.
#[derive(Debug, Clone)]
pub struct Session {
    user: Option<User>,
    friends: Vec<Friend>,
    rooms: Vec<Room>,
    requests: FriendRequests,
    private: ConversationStore,
    room_messages: ConversationStore,
    status: BTreeMap<Resource, ResourceStatus>,
    retry: BTreeMap<Resource, RetryState>,
    push: PushState,
    selected: Option<Recipient>,
    /// Conversations with messages that arrived while not open.
    unread: HashSet<(ConversationKind, ConversationKey)>,
    status_message: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Signed-out session.
    pub fn new() -> Self {
        Self {
            user: None,
            friends: Vec::new(),
            rooms: Vec::new(),
            requests: FriendRequests::default(),
            private: ConversationStore::new(0),
            room_messages: ConversationStore::new(0),
            status: BTreeMap::new(),
            retry: BTreeMap::new(),
            push: PushState::Disconnected,
            selected: None,
            unread: HashSet::new(),
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            SessionEvent::Authenticated(user) => self.start(user),
            SessionEvent::Unauthorized => self.sign_out(),
            SessionEvent::Command(command) => self.command(command),
            event if self.user.is_none() => {
                tracing::debug!(?event, "dropping event outside a session");
                vec![]
            },
            SessionEvent::FriendsLoaded(friends) => {
                self.friends = friends;
                self.loaded(Resource::Friends);
                self.refresh_selected();
                vec![SessionAction::Render]
            },
            SessionEvent::RoomsLoaded(rooms) => {
                self.rooms = rooms;
                self.loaded(Resource::Rooms);
                self.refresh_selected();
                vec![SessionAction::Render]
            },
            SessionEvent::RequestsLoaded(payload) => {
                self.requests = FriendRequests::from_payload(payload);
                self.loaded(Resource::Requests);
                vec![SessionAction::Render]
            },
            SessionEvent::PrivateMessagesLoaded(snapshot) => {
                self.hydrate(Resource::PrivateMessages, ConversationKind::Private, snapshot)
            },
            SessionEvent::RoomMessagesLoaded(snapshot) => {
                self.hydrate(Resource::RoomMessages, ConversationKind::Room, snapshot)
            },
            SessionEvent::RetryChanged { resource, state } => {
                self.retry.insert(resource, state);
                vec![SessionAction::Render]
            },
            SessionEvent::FetchGaveUp(resource) => {
                self.status.insert(resource, ResourceStatus::Failed);
                vec![SessionAction::Render]
            },
            SessionEvent::PushConnected => {
                self.push = PushState::Connected;
                vec![SessionAction::Render]
            },
            SessionEvent::PushDisconnected => {
                self.push = PushState::Disconnected;
                vec![SessionAction::Render]
            },
            SessionEvent::PushMessage { kind, message } => self.deliver(kind, message),
            SessionEvent::PushError(text) => {
                vec![SessionAction::Notify(Notification::error(text)), SessionAction::Render]
            },
            SessionEvent::RequestResolved { id, direction, response, friend } => {
                self.resolved(id, direction, response, friend)
            },
            SessionEvent::FriendRequestSent { username, outcome } => {
                let notification = if outcome.is_success() {
                    Notification::success(outcome.message())
                } else {
                    Notification::error(outcome.message())
                };
                tracing::info!(%username, ?outcome, "friend request sent");
                let mut actions = vec![SessionAction::Notify(notification)];
                if outcome.is_success() {
                    actions.push(SessionAction::Fetch(Resource::Requests));
                }
                actions.push(SessionAction::Render);
                actions
            },
            SessionEvent::CommandFailed(text) => {
                vec![SessionAction::Notify(Notification::error(text)), SessionAction::Render]
            },
            SessionEvent::Select(recipient) => self.select(recipient),
        }
    }

    /// Signed-in user, if a session is active.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Accepted friends.
    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    /// Rooms the user belongs to.
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Pending friend requests.
    pub fn requests(&self) -> &FriendRequests {
        &self.requests
    }

    /// Private conversation store.
    pub fn private_messages(&self) -> &ConversationStore {
        &self.private
    }

    /// Room conversation store.
    pub fn room_messages(&self) -> &ConversationStore {
        &self.room_messages
    }

    /// Load state of a resource.
    pub fn status(&self, resource: Resource) -> ResourceStatus {
        self.status.get(&resource).copied().unwrap_or_default()
    }

    /// Last retry state reported for a resource.
    pub fn retry_state(&self, resource: Resource) -> RetryState {
        self.retry.get(&resource).copied().unwrap_or(RetryState::IDLE)
    }

    /// Push channel state.
    pub fn push_state(&self) -> PushState {
        self.push
    }

    /// Open conversation.
    pub fn selected(&self) -> Option<&Recipient> {
        self.selected.as_ref()
    }

    /// Messages of a friend or room conversation.
    pub fn conversation(&self, recipient: &Recipient) -> &[Message] {
        self.store(recipient.kind()).messages(recipient.id())
    }

    /// Store for a keyspace.
    pub fn store(&self, kind: ConversationKind) -> &ConversationStore {
        match kind {
            ConversationKind::Private => &self.private,
            ConversationKind::Room => &self.room_messages,
        }
    }

    /// True if messages arrived in the conversation since it was last open.
    pub fn is_unread(&self, kind: ConversationKind, key: ConversationKey) -> bool {
        self.unread.contains(&(kind, key))
    }

    /// Transient status line. `None` if nothing to show.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Friend with this name, else room with this name.
    pub fn find_recipient(&self, name: &str) -> Option<Recipient> {
        self.friends
            .iter()
            .find(|friend| friend.name == name)
            .map(|friend| Recipient::Friend(friend.clone()))
            .or_else(|| {
                let room = self.rooms.iter().find(|room| room.name == name)?;
                Some(Recipient::Room(room.clone()))
            })
    }

    fn start(&mut self, user: User) -> Vec<SessionAction> {
        tracing::info!(user_id = user.id, username = %user.username, "session started");
        *self = Self::new();
        self.private = ConversationStore::new(user.id);
        self.room_messages = ConversationStore::new(user.id);
        self.status_message = Some(format!("Signed in as {}", user.username));
        self.user = Some(user);

        let mut actions = vec![SessionAction::ConnectPush];
        for resource in Resource::ALL {
            self.status.insert(resource, ResourceStatus::Loading);
            actions.push(SessionAction::Fetch(resource));
        }
        actions.push(SessionAction::Render);
        actions
    }

    fn sign_out(&mut self) -> Vec<SessionAction> {
        let Some(user) = self.user.take() else {
            return vec![];
        };
        tracing::warn!(user_id = user.id, "session expired, signing out");
        *self = Self::new();
        self.status_message = Some("Session expired. Please sign in again.".into());
        vec![SessionAction::SignOut, SessionAction::Render]
    }

    fn command(&mut self, command: UserCommand) -> Vec<SessionAction> {
        if command == UserCommand::Quit {
            return vec![SessionAction::Quit];
        }
        if self.user.is_none() {
            return vec![notify_warning("Not signed in.")];
        }

        match command {
            UserCommand::Quit => vec![SessionAction::Quit],
            UserCommand::Open(name) => match self.find_recipient(&name) {
                Some(recipient) => self.select(recipient),
                None => refuse(format!("No friend or room named {name}.")),
            },
            UserCommand::Send(text) => {
                let content = text.trim();
                if content.is_empty() {
                    return vec![];
                }
                let Some(recipient) = self.selected.clone() else {
                    return refuse("Open a friend or room first.");
                };
                if self.push == PushState::Disconnected {
                    return refuse("Not connected. Message not sent.");
                }
                vec![SessionAction::Publish { recipient, content: content.to_owned() }]
            },
            UserCommand::AddFriend(username) => {
                let username = username.trim();
                if username.is_empty() {
                    return vec![];
                }
                vec![SessionAction::SendFriendRequest(username.to_owned())]
            },
            UserCommand::Respond { id, response } => {
                let Some(request) = self.requests.get(id).cloned() else {
                    return refuse(format!("No pending request {id}."));
                };
                if !response.applies_to(request.direction) {
                    let direction = match request.direction {
                        RequestDirection::Incoming => "an incoming",
                        RequestDirection::Outgoing => "an outgoing",
                    };
                    return refuse(format!("Cannot {} {direction} request.", response.as_str()));
                }
                vec![SessionAction::RespondToRequest { request, response }]
            },
        }
    }

    fn select(&mut self, recipient: Recipient) -> Vec<SessionAction> {
        self.unread.remove(&(recipient.kind(), recipient.id()));
        self.selected = Some(recipient);
        vec![SessionAction::Render]
    }

    fn loaded(&mut self, resource: Resource) {
        self.status.insert(resource, ResourceStatus::Ready);
    }

    /// Keep the open conversation in step with refreshed lists. A friend or
    /// room that disappeared closes it.
    fn refresh_selected(&mut self) {
        let Some(selected) = &self.selected else {
            return;
        };
        let refreshed = match selected {
            Recipient::Friend(friend) => {
                self.friends.iter().find(|f| f.id == friend.id).cloned().map(Recipient::Friend)
            },
            Recipient::Room(room) => {
                self.rooms.iter().find(|r| r.id == room.id).cloned().map(Recipient::Room)
            },
        };
        if refreshed.is_none() {
            tracing::debug!(name = selected.name(), "open conversation no longer listed");
        }
        self.selected = refreshed;
    }

    fn hydrate(
        &mut self,
        resource: Resource,
        kind: ConversationKind,
        snapshot: murmur_client::MessageSnapshot,
    ) -> Vec<SessionAction> {
        let store = match kind {
            ConversationKind::Private => &mut self.private,
            ConversationKind::Room => &mut self.room_messages,
        };
        match store.hydrate(snapshot) {
            Ok(()) => {
                self.loaded(resource);
                vec![SessionAction::Render]
            },
            Err(e) => {
                tracing::warn!(%resource, error = %e, "snapshot rejected");
                self.status.insert(resource, ResourceStatus::Failed);
                let notification = Notification::error(format!("Could not load {resource}."));
                vec![SessionAction::Notify(notification), SessionAction::Render]
            },
        }
    }

    fn deliver(
        &mut self,
        kind: ConversationKind,
        message: murmur_core::WireMessage,
    ) -> Vec<SessionAction> {
        let store = match kind {
            ConversationKind::Private => &mut self.private,
            ConversationKind::Room => &mut self.room_messages,
        };
        match store.insert(message, kind) {
            Ok(InsertOutcome::Appended { key, .. }) => {
                let open =
                    self.selected.as_ref().is_some_and(|r| r.kind() == kind && r.id() == key);
                if !open {
                    self.unread.insert((kind, key));
                }
                vec![SessionAction::Render]
            },
            Ok(InsertOutcome::Duplicate { .. }) => vec![],
            Err(e) => {
                tracing::warn!(?kind, error = %e, "dropping undeliverable message");
                vec![]
            },
        }
    }

    fn resolved(
        &mut self,
        id: u64,
        direction: RequestDirection,
        response: RequestResponse,
        friend: Option<String>,
    ) -> Vec<SessionAction> {
        let removed = self.requests.remove(id, direction);
        let username = friend.or_else(|| removed.map(|request| request.username));

        let mut actions = Vec::new();
        match (response, username) {
            (RequestResponse::Accept, Some(name)) => {
                actions.push(SessionAction::Notify(Notification::success(format!(
                    "You are now friends with {name}."
                ))));
                actions.push(SessionAction::Fetch(Resource::Friends));
            },
            (RequestResponse::Accept, None) => {
                actions.push(SessionAction::Fetch(Resource::Friends));
            },
            (RequestResponse::Block, Some(name)) => {
                let notification = Notification::info(format!("Blocked {name}."));
                actions.push(SessionAction::Notify(notification));
            },
            (RequestResponse::Reject | RequestResponse::Delete | RequestResponse::Block, _) => {},
        }
        actions.push(SessionAction::Render);
        actions
    }
}

fn notify_warning(message: impl Into<String>) -> SessionAction {
    SessionAction::Notify(Notification::warning(message))
}

/// Refuse a command locally: warn and redraw.
fn refuse(message: impl Into<String>) -> Vec<SessionAction> {
    vec![notify_warning(message), SessionAction::Render]
}

#[cfg(test)]
mod tests {
    use murmur_core::{FriendStatus, RequestData, RequestsPayload, WireMessage};

    use super::*;

    fn user() -> User {
        User { id: 7, username: "ann".into(), email: "ann@example.com".into() }
    }

    fn bob() -> Friend {
        Friend { id: 42, name: "bob".into(), email: String::new(), status: FriendStatus::Online }
    }

    fn wire(id: u64, sender: u64, recipient: u64) -> WireMessage {
        WireMessage {
            id: Some(id),
            sender_id: sender,
            sender_name: String::new(),
            recipient_id: recipient,
            recipient_name: String::new(),
            content: format!("m{id}"),
            timestamp: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn authenticated_connects_and_fetches_everything() {
        let mut session = Session::new();
        let actions = session.handle(SessionEvent::Authenticated(user()));

        assert_eq!(actions.first(), Some(&SessionAction::ConnectPush));
        for resource in Resource::ALL {
            assert!(actions.contains(&SessionAction::Fetch(resource)));
            assert_eq!(session.status(resource), ResourceStatus::Loading);
        }
        assert_eq!(session.private_messages().current_user(), 7);
    }

    #[test]
    fn events_outside_a_session_are_dropped() {
        let mut session = Session::new();
        assert!(session.handle(SessionEvent::FriendsLoaded(vec![bob()])).is_empty());
        assert!(session.friends().is_empty());
    }

    #[test]
    fn push_message_marks_closed_conversation_unread() {
        let mut session = Session::new();
        session.handle(SessionEvent::Authenticated(user()));
        session.handle(SessionEvent::FriendsLoaded(vec![bob()]));

        let private = |id| SessionEvent::PushMessage {
            kind: ConversationKind::Private,
            message: wire(id, 42, 7),
        };
        session.handle(private(1));
        assert!(session.is_unread(ConversationKind::Private, 42));

        session.handle(SessionEvent::Command(UserCommand::Open("bob".into())));
        assert!(!session.is_unread(ConversationKind::Private, 42));

        session.handle(private(2));
        assert!(!session.is_unread(ConversationKind::Private, 42));
        assert_eq!(session.conversation(&Recipient::Friend(bob())).len(), 2);
    }

    #[test]
    fn duplicate_delivery_does_not_render() {
        let mut session = Session::new();
        session.handle(SessionEvent::Authenticated(user()));
        let event =
            SessionEvent::PushMessage { kind: ConversationKind::Room, message: wire(1, 42, 300) };

        assert_eq!(session.handle(event.clone()), vec![SessionAction::Render]);
        assert!(session.handle(event).is_empty());
    }

    #[test]
    fn respond_checks_direction() {
        let mut session = Session::new();
        session.handle(SessionEvent::Authenticated(user()));
        session.handle(SessionEvent::RequestsLoaded(RequestsPayload {
            incoming: vec![RequestData { id: 1, username: "carol".into() }],
            outgoing: vec![],
        }));

        let delete = session.handle(SessionEvent::Command(UserCommand::Respond {
            id: 1,
            response: RequestResponse::Delete,
        }));
        assert!(matches!(
            &delete[0],
            SessionAction::Notify(n) if n.message == "Cannot delete an incoming request."
        ));

        let accept = session.handle(SessionEvent::Command(UserCommand::Respond {
            id: 1,
            response: RequestResponse::Accept,
        }));
        assert!(matches!(
            &accept[..],
            [SessionAction::RespondToRequest { request, .. }] if request.username == "carol"
        ));
    }
}
