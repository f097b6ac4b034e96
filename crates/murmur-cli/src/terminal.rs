//! Line-oriented terminal driver.
//!
//! Implements [`Driver`] over any async line source and any writer. Renders
//! are incremental: only what changed since the previous render is printed
//! (new messages, push connection changes, new requests, failed loads), and
//! opening a conversation prints its grouped history. Notifications are
//! tracked as toasts: a repeat is not printed again while the first one is
//! still within its display duration.

use std::{
    collections::{HashMap, HashSet},
    io::{self, Write},
};

use murmur_app::{Driver, PushState, Resource, ResourceStatus, Session, UserCommand};
use murmur_core::{ConversationKey, ConversationKind, Environment, Notification, ToastQueue};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::{
    input::{HELP, Input, parse_line},
    render,
};

/// Terminal driver implementing the [`Driver`] trait.
pub struct TerminalDriver<R, W, E: Environment> {
    lines: Lines<R>,
    out: W,
    env: E,
    /// Messages already shown (or skipped as history) per conversation.
    printed: HashMap<(ConversationKind, ConversationKey), usize>,
    hydrated: HashSet<ConversationKind>,
    push: PushState,
    failed: HashSet<Resource>,
    requests: HashSet<u64>,
    selected: Option<(ConversationKind, ConversationKey)>,
    status_message: Option<String>,
    toasts: ToastQueue<E::Instant>,
}

impl<R, W, E> TerminalDriver<R, W, E>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
    E: Environment,
{
    /// Create a driver reading commands from `input` and printing to `out`.
    pub fn new(input: R, out: W, env: E) -> Self {
        Self {
            lines: input.lines(),
            out,
            env,
            printed: HashMap::new(),
            hydrated: HashSet::new(),
            push: PushState::Disconnected,
            failed: HashSet::new(),
            requests: HashSet::new(),
            selected: None,
            status_message: None,
            toasts: ToastQueue::new(),
        }
    }

    /// Consume the driver, returning the writer.
    pub fn into_output(self) -> W {
        self.out
    }

    fn show_status(&mut self, session: &Session) -> io::Result<()> {
        let text = session.status_message();
        if text.is_some() && text != self.status_message.as_deref() {
            self.status_message = text.map(str::to_owned);
            writeln!(self.out, "* {}", text.unwrap_or_default())?;
        }
        Ok(())
    }

    fn show_connection(&mut self, session: &Session) -> io::Result<()> {
        if session.push_state() != self.push {
            self.push = session.push_state();
            match self.push {
                PushState::Connected => writeln!(self.out, "* live updates on")?,
                PushState::Disconnected => writeln!(self.out, "* live updates lost, reconnecting")?,
            }
        }

        for resource in Resource::ALL {
            if session.status(resource) != ResourceStatus::Failed {
                self.failed.remove(&resource);
            } else if self.failed.insert(resource) {
                writeln!(self.out, "* could not load {resource}")?;
            }
        }
        Ok(())
    }

    fn show_requests(&mut self, session: &Session) -> io::Result<()> {
        let requests = session.requests();
        for request in requests.incoming().iter().chain(requests.outgoing()) {
            if self.requests.insert(request.id) {
                writeln!(self.out, "* request {}", render::request_line(request))?;
            }
        }
        Ok(())
    }

    fn show_selection(&mut self, session: &Session) -> io::Result<()> {
        let selected = session.selected().map(|recipient| (recipient.kind(), recipient.id()));
        if selected == self.selected {
            return Ok(());
        }
        self.selected = selected;

        if let Some(recipient) = session.selected() {
            writeln!(self.out, "== {} ==", recipient.name())?;
            let messages = session.conversation(recipient);
            for line in render::history(messages, self.env.wall_clock()) {
                writeln!(self.out, "{line}")?;
            }
            self.printed.insert((recipient.kind(), recipient.id()), messages.len());
        }
        Ok(())
    }

    fn show_messages(&mut self, session: &Session) -> io::Result<()> {
        let Some(user) = session.user() else {
            return Ok(());
        };

        for (kind, resource) in [
            (ConversationKind::Private, Resource::PrivateMessages),
            (ConversationKind::Room, Resource::RoomMessages),
        ] {
            // The first render after a snapshot lands records it silently.
            let hydrating =
                session.status(resource) == ResourceStatus::Ready && self.hydrated.insert(kind);
            let snapshot = session.store(kind).snapshot();

            for (&key, messages) in snapshot.iter() {
                let printed = self.printed.entry((kind, key)).or_insert(0);
                if hydrating || *printed > messages.len() {
                    *printed = messages.len();
                    continue;
                }
                let open = self.selected == Some((kind, key));
                for message in &messages[*printed..] {
                    let conversation =
                        (!open).then(|| render::conversation_name(message, kind, user.id));
                    writeln!(self.out, "{}", render::live_line(message, conversation))?;
                }
                *printed = messages.len();
            }
        }
        Ok(())
    }
}

impl<R, W, E> Driver for TerminalDriver<R, W, E>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
    E: Environment,
{
    type Error = io::Error;

    async fn next_command(&mut self) -> Result<Option<UserCommand>, Self::Error> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            match parse_line(&line) {
                Ok(Input::Command(command)) => return Ok(Some(command)),
                Ok(Input::Help) => writeln!(self.out, "{HELP}")?,
                Ok(Input::Empty) => {},
                Err(e) => writeln!(self.out, "! {e}")?,
            }
            self.out.flush()?;
        }
    }

    fn render(&mut self, session: &Session) -> Result<(), Self::Error> {
        self.toasts.expire(self.env.now());
        self.show_status(session)?;
        self.show_connection(session)?;
        self.show_requests(session)?;
        self.show_selection(session)?;
        self.show_messages(session)?;
        self.out.flush()
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error> {
        let now = self.env.now();
        self.toasts.expire(now);
        if self.toasts.active().iter().any(|toast| toast.notification == *notification) {
            return Ok(());
        }
        self.toasts.push(notification.clone(), now);
        writeln!(self.out, "[{}] {}", notification.severity, notification.message)?;
        self.out.flush()
    }

    fn stop(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::debug!(error = %e, "final flush failed");
        }
    }
}
