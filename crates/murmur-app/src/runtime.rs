//! Generic runtime for session orchestration.
//!
//! The Runtime drives the session event loop, coordinating between:
//! - [`Session`]: pure session state machine
//! - [`ReconnectingFetcher`]s: one per [`Resource`], racing independently
//! - [`PushChannel`]: live deliveries and publishing
//! - [`Driver`]: frontend I/O
//!
//! Every source posts [`SessionEvent`]s into channels the loop selects over,
//! so the session only ever changes on the runtime task.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use murmur_client::{ApiClient, ClientConfig, PushChannel, PushEvent, ReconnectingFetcher};
use murmur_core::{
    ApiError, ConversationKind, Environment, FriendRequest, Notification, Notifier, RequestResponse,
    SendRequestOutcome, TracingNotifier,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::{Driver, Resource, Session, SessionAction, SessionEvent, UserCommand};

/// Push deliveries buffered before the channel task waits on the loop.
const PUSH_BUFFER: usize = 64;

/// Errors that end the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError<D: std::error::Error + 'static> {
    /// The frontend failed.
    #[error("driver error: {0}")]
    Driver(#[source] D),

    /// The current user could not be resolved.
    #[error("could not start session: {0}")]
    Api(#[from] ApiError),
}

/// [`Notifier`] that forwards into the runtime loop, so fetcher notifications
/// reach the driver on the runtime task. Once the loop is gone they are
/// logged instead.
#[derive(Debug, Clone)]
pub struct ChannelNotifier(mpsc::UnboundedSender<Notification>);

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(mpsc::error::SendError(notification)) = self.0.send(notification) {
            TracingNotifier.notify(notification);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Generic runtime that orchestrates Session, fetchers, push and Driver.
///
/// # Type Parameters
///
/// - `D`: frontend driver
/// - `E`: environment for timers
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    api: ApiClient,
    config: ClientConfig,
    session: Session,
    fetchers: BTreeMap<Resource, ReconnectingFetcher<E>>,
    push: Option<PushChannel>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    push_tx: mpsc::Sender<PushEvent>,
    push_rx: mpsc::Receiver<PushEvent>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    unauthorized: watch::Receiver<bool>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    /// Create a runtime for an already signed-in `api` client.
    pub fn new(driver: D, env: E, api: ApiClient, config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::channel(PUSH_BUFFER);
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier(notify_tx));

        let fetchers = Resource::ALL
            .into_iter()
            .map(|resource| {
                let fetcher = ReconnectingFetcher::new(
                    env.clone(),
                    config.retry.clone(),
                    Arc::clone(&notifier),
                    resource.as_str(),
                );
                (resource, fetcher)
            })
            .collect();

        let unauthorized = api.unauthorized();
        Self {
            driver,
            env,
            api,
            config,
            session: Session::new(),
            fetchers,
            push: None,
            events_tx,
            events_rx,
            push_tx,
            push_rx,
            notifications,
            unauthorized,
        }
    }

    /// Run until the user quits, input ends or the session expires.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Api` if the current user cannot be resolved.
    /// - `RuntimeError::Driver` if the frontend fails.
    pub async fn run(mut self) -> Result<(), RuntimeError<D::Error>> {
        let user = self.api.me().await?;
        self.forward_retry_states();

        let result = self.drive(SessionEvent::Authenticated(user)).await;
        self.shutdown();
        self.driver.stop();
        result
    }

    async fn drive(&mut self, first: SessionEvent) -> Result<(), RuntimeError<D::Error>> {
        if self.dispatch(first)? == Flow::Stop {
            return Ok(());
        }

        loop {
            let event = tokio::select! {
                command = self.driver.next_command() => {
                    match command.map_err(RuntimeError::Driver)? {
                        Some(command) => SessionEvent::Command(command),
                        None => SessionEvent::Command(UserCommand::Quit),
                    }
                },
                Some(event) = self.events_rx.recv() => event,
                Some(event) = self.push_rx.recv() => from_push(event),
                Some(notification) = self.notifications.recv() => {
                    self.driver.notify(&notification).map_err(RuntimeError::Driver)?;
                    continue;
                },
                Ok(()) = self.unauthorized.changed() => {
                    if !*self.unauthorized.borrow_and_update() {
                        continue;
                    }
                    SessionEvent::Unauthorized
                },
            };

            if self.dispatch(event)? == Flow::Stop {
                return Ok(());
            }
        }
    }

    /// Feed one event to the session and execute every resulting action.
    fn dispatch(&mut self, event: SessionEvent) -> Result<Flow, RuntimeError<D::Error>> {
        let mut flow = Flow::Continue;
        for action in self.session.handle(event) {
            if self.execute(action)? == Flow::Stop {
                flow = Flow::Stop;
            }
        }
        Ok(flow)
    }

    fn execute(&mut self, action: SessionAction) -> Result<Flow, RuntimeError<D::Error>> {
        match action {
            SessionAction::Render => {
                self.driver.render(&self.session).map_err(RuntimeError::Driver)?;
            },
            SessionAction::Notify(notification) => {
                self.driver.notify(&notification).map_err(RuntimeError::Driver)?;
            },
            SessionAction::Fetch(resource) => self.fetch(resource),
            SessionAction::ConnectPush => self.connect_push(),
            SessionAction::Publish { recipient, content } => {
                let result = match &self.push {
                    Some(push) => push.publish(&recipient, &content),
                    None => Err(murmur_client::PushError::Closed),
                };
                if let Err(e) = result {
                    tracing::warn!(recipient = recipient.name(), error = %e, "publish failed");
                    let notification = Notification::error("Message could not be sent.");
                    self.driver.notify(&notification).map_err(RuntimeError::Driver)?;
                }
            },
            SessionAction::SendFriendRequest(username) => self.send_friend_request(username),
            SessionAction::RespondToRequest { request, response } => {
                self.respond(request, response);
            },
            SessionAction::SignOut => {
                self.shutdown();
                return Ok(Flow::Stop);
            },
            SessionAction::Quit => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    fn fetch(&self, resource: Resource) {
        let Some(fetcher) = self.fetchers.get(&resource) else {
            return;
        };
        let api = self.api.clone();
        let events = &self.events_tx;

        let started = match resource {
            Resource::Friends => start_fetch(
                fetcher,
                resource,
                events,
                move || {
                    let api = api.clone();
                    async move { api.friends().await }
                },
                SessionEvent::FriendsLoaded,
            ),
            Resource::Requests => start_fetch(
                fetcher,
                resource,
                events,
                move || {
                    let api = api.clone();
                    async move { api.friend_requests().await }
                },
                SessionEvent::RequestsLoaded,
            ),
            Resource::Rooms => start_fetch(
                fetcher,
                resource,
                events,
                move || {
                    let api = api.clone();
                    async move { api.rooms().await }
                },
                SessionEvent::RoomsLoaded,
            ),
            Resource::PrivateMessages => start_fetch(
                fetcher,
                resource,
                events,
                move || {
                    let api = api.clone();
                    async move { api.private_messages().await }
                },
                SessionEvent::PrivateMessagesLoaded,
            ),
            Resource::RoomMessages => start_fetch(
                fetcher,
                resource,
                events,
                move || {
                    let api = api.clone();
                    async move { api.room_messages().await }
                },
                SessionEvent::RoomMessagesLoaded,
            ),
        };

        if !started {
            tracing::debug!(%resource, "fetch already running");
        }
    }

    fn connect_push(&mut self) {
        if self.push.is_some() {
            return;
        }
        let cookie = self
            .api
            .cookie_header()
            .and_then(|value| value.to_str().ok().map(str::to_owned));
        if cookie.is_none() {
            tracing::warn!("no session cookie for the push channel");
        }
        self.push = Some(PushChannel::spawn(
            self.env.clone(),
            self.config.ws_url.clone(),
            cookie,
            self.config.push_reconnect_delay,
            self.push_tx.clone(),
        ));
    }

    fn send_friend_request(&self, username: String) {
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.send_friend_request(&username).await;
            let outcome = SendRequestOutcome::from_result(&result);
            let _ = events.send(SessionEvent::FriendRequestSent { username, outcome });
        });
    }

    fn respond(&self, request: FriendRequest, response: RequestResponse) {
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match response {
                RequestResponse::Accept => {
                    api.respond_to_request(request.id, true).await.map(|reply| reply.username)
                },
                RequestResponse::Reject => {
                    api.respond_to_request(request.id, false).await.map(|_| None)
                },
                RequestResponse::Delete => api.delete_request(request.id).await.map(|()| None),
                RequestResponse::Block => api.block_user(&request.username).await.map(|()| None),
            };

            let event = match result {
                Ok(friend) => SessionEvent::RequestResolved {
                    id: request.id,
                    direction: request.direction,
                    response,
                    friend,
                },
                Err(e) => {
                    tracing::warn!(
                        id = request.id,
                        response = response.as_str(),
                        error = %e,
                        "request response failed"
                    );
                    let action =
                        format!("{} the request with {}", response.as_str(), request.username);
                    SessionEvent::CommandFailed(failure_message(&action, &e))
                },
            };
            let _ = events.send(event);
        });
    }

    /// Mirror every fetcher's retry state into the session.
    fn forward_retry_states(&self) {
        for (&resource, fetcher) in &self.fetchers {
            let mut states = fetcher.subscribe();
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                while states.changed().await.is_ok() {
                    let state = *states.borrow_and_update();
                    if events.send(SessionEvent::RetryChanged { resource, state }).is_err() {
                        break;
                    }
                }
            });
        }
    }

    fn shutdown(&mut self) {
        for fetcher in self.fetchers.values() {
            fetcher.stop();
        }
        if let Some(push) = self.push.take() {
            push.stop();
        }
    }
}

fn start_fetch<E, P, Fut, T>(
    fetcher: &ReconnectingFetcher<E>,
    resource: Resource,
    events: &mpsc::UnboundedSender<SessionEvent>,
    probe: P,
    loaded: fn(T) -> SessionEvent,
) -> bool
where
    E: Environment,
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    let on_success = {
        let events = events.clone();
        move |value| {
            let _ = events.send(loaded(value));
        }
    };
    let on_give_up = {
        let events = events.clone();
        move || {
            let _ = events.send(SessionEvent::FetchGaveUp(resource));
        }
    };
    fetcher.start(probe, on_success, on_give_up)
}

/// User-facing text for a failed REST command.
fn failure_message(action: &str, error: &ApiError) -> String {
    if error.is_transient() {
        format!("Could not {action}: the server is unavailable. Try again later.")
    } else {
        format!("Could not {action}: {error}")
    }
}

fn from_push(event: PushEvent) -> SessionEvent {
    match event {
        PushEvent::Connected => SessionEvent::PushConnected,
        PushEvent::Disconnected => SessionEvent::PushDisconnected,
        PushEvent::PrivateMessage(message) => {
            SessionEvent::PushMessage { kind: ConversationKind::Private, message }
        },
        PushEvent::RoomMessage(message) => {
            SessionEvent::PushMessage { kind: ConversationKind::Room, message }
        },
        PushEvent::Error(text) => SessionEvent::PushError(text),
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::WireMessage;

    use super::*;

    #[test]
    fn push_events_map_to_session_events() {
        let message = WireMessage {
            id: Some(1),
            sender_id: 42,
            sender_name: "bob".into(),
            recipient_id: 300,
            recipient_name: "rust".into(),
            content: "hi".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
        };

        assert!(matches!(from_push(PushEvent::Connected), SessionEvent::PushConnected));
        assert!(matches!(
            from_push(PushEvent::RoomMessage(message)),
            SessionEvent::PushMessage { kind: ConversationKind::Room, .. }
        ));
        assert!(matches!(
            from_push(PushEvent::Error("x".into())),
            SessionEvent::PushError(t) if t == "x"
        ));
    }

    #[tokio::test]
    async fn channel_notifier_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelNotifier(tx).notify(Notification::info("hello"));
        assert_eq!(rx.recv().await.map(|n| n.message), Some("hello".to_owned()));
    }

    #[test]
    fn channel_notifier_outlives_the_loop() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelNotifier(tx).notify(Notification::error("late"));
    }

    #[test]
    fn transient_failures_suggest_retrying() {
        let busy = failure_message("accept the request with carol", &ApiError::Status(503));
        assert_eq!(
            busy,
            "Could not accept the request with carol: the server is unavailable. Try again later."
        );

        let missing = failure_message("accept the request with carol", &ApiError::NotFound);
        assert_eq!(missing, "Could not accept the request with carol: not found");
    }
}
