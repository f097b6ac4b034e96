//! Push channel: STOMP over a WebSocket.
//!
//! [`PushChannel`] owns one background task that connects, subscribes to the
//! three user queues, forwards deliveries as [`PushEvent`]s and publishes
//! outgoing messages. When the socket drops it waits a fixed delay (no
//! backoff) and connects again until stopped.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use murmur_core::{Environment, Recipient, WireMessage};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::COOKIE},
    },
};

use crate::stomp::{Command, Frame};

/// Private messages addressed to the signed-in user.
pub const PRIVATE_TOPIC: &str = "/user/queue/private-messages";

/// Messages from rooms the user belongs to.
pub const ROOM_TOPIC: &str = "/user/queue/room-messages";

/// Errors the server reports for this user's publishes.
pub const ERROR_TOPIC: &str = "/user/queue/errors";

const SUBSCRIPTIONS: [(&str, &str); 3] =
    [("sub-private", PRIVATE_TOPIC), ("sub-room", ROOM_TOPIC), ("sub-errors", ERROR_TOPIC)];

/// Push channel errors.
#[derive(Debug, Error)]
pub enum PushError {
    /// Could not build the handshake request.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// Outgoing body could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The channel task has stopped.
    #[error("push channel closed")]
    Closed,
}

impl From<tungstenite::Error> for PushError {
    fn from(error: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

/// Something that arrived on (or happened to) the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Broker accepted the session; subscriptions follow immediately.
    Connected,
    /// Socket lost; a reconnect is scheduled.
    Disconnected,
    /// A private message for the signed-in user.
    PrivateMessage(WireMessage),
    /// A room message.
    RoomMessage(WireMessage),
    /// Error text from the error queue.
    Error(String),
}

/// Body published to the send destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Friend or room id.
    pub id: u64,
    /// Message text.
    pub content: String,
    /// Always `TEXT`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl OutgoingMessage {
    /// Text message to `recipient`.
    pub fn text(recipient: &Recipient, content: impl Into<String>) -> Self {
        Self { id: recipient.id(), content: content.into(), kind: "TEXT" }
    }
}

#[derive(Debug)]
enum PushCommand {
    Publish { destination: &'static str, body: String },
    Stop,
}

/// How a connected session ended.
enum SessionEnd {
    Lost,
    Stopped,
}

/// Handle to the push task.
#[derive(Debug)]
pub struct PushChannel {
    commands: mpsc::UnboundedSender<PushCommand>,
    abort_handle: tokio::task::AbortHandle,
}

impl PushChannel {
    /// Spawn the push task. Events are delivered on `events`; the task ends
    /// when stopped, when this handle is dropped, or when `events` closes.
    pub fn spawn<E: Environment>(
        env: E,
        ws_url: String,
        cookie: Option<String>,
        reconnect_delay: Duration,
        events: mpsc::Sender<PushEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(env, ws_url, cookie, reconnect_delay, command_rx, events));
        Self { commands, abort_handle: task.abort_handle() }
    }

    /// Publish a text message to a friend or room.
    ///
    /// Messages published while the socket is down are dropped, not queued.
    pub fn publish(&self, recipient: &Recipient, content: &str) -> Result<(), PushError> {
        let body = serde_json::to_string(&OutgoingMessage::text(recipient, content))?;
        let destination = recipient.send_destination();
        self.commands
            .send(PushCommand::Publish { destination, body })
            .map_err(|_| PushError::Closed)
    }

    /// Disconnect gracefully and end the task.
    pub fn stop(&self) {
        if self.commands.send(PushCommand::Stop).is_err() {
            self.abort_handle.abort();
        }
    }
}

async fn run<E: Environment>(
    env: E,
    ws_url: String,
    cookie: Option<String>,
    reconnect_delay: Duration,
    mut commands: mpsc::UnboundedReceiver<PushCommand>,
    events: mpsc::Sender<PushEvent>,
) {
    loop {
        match session(&ws_url, cookie.as_deref(), &mut commands, &events).await {
            Ok(SessionEnd::Stopped) => {
                tracing::debug!("push channel stopped");
                return;
            },
            Ok(SessionEnd::Lost) => tracing::warn!("push connection lost"),
            Err(e) => tracing::warn!(error = %e, "push connection failed"),
        }

        if events.send(PushEvent::Disconnected).await.is_err() {
            return;
        }

        tracing::debug!(delay_ms = reconnect_delay.as_millis() as u64, "push reconnect scheduled");
        let sleep = env.sleep(reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(PushCommand::Publish { destination, .. }) => {
                        tracing::warn!(destination, "dropping publish while disconnected");
                    },
                    Some(PushCommand::Stop) | None => return,
                },
            }
        }
    }
}

async fn session(
    ws_url: &str,
    cookie: Option<&str>,
    commands: &mut mpsc::UnboundedReceiver<PushCommand>,
    events: &mpsc::Sender<PushEvent>,
) -> Result<SessionEnd, PushError> {
    let mut request = ws_url.into_client_request()?;
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(cookie).map_err(|e| PushError::Handshake(e.to_string()))?;
        request.headers_mut().insert(COOKIE, value);
    }
    let host = request.uri().host().unwrap_or("localhost").to_owned();

    let (stream, _) = connect_async(request).await?;
    let (mut sink, mut source) = stream.split();
    sink.send(Message::text(Frame::connect(&host).encode())).await?;

    loop {
        tokio::select! {
            incoming = source.next() => {
                let text = match incoming {
                    None | Some(Ok(Message::Close(_))) => return Ok(SessionEnd::Lost),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(_)) => continue,
                };
                let frame = match Frame::decode(text.as_str()) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable frame");
                        continue;
                    },
                };

                if frame.command == Command::Connected {
                    tracing::info!(%host, "push channel connected");
                    if events.send(PushEvent::Connected).await.is_err() {
                        return Ok(SessionEnd::Stopped);
                    }
                    for (id, destination) in SUBSCRIPTIONS {
                        sink.send(Message::text(Frame::subscribe(id, destination).encode())).await?;
                    }
                } else if let Some(event) = route(&frame)
                    && events.send(event).await.is_err()
                {
                    return Ok(SessionEnd::Stopped);
                }
            },
            command = commands.recv() => match command {
                Some(PushCommand::Publish { destination, body }) => {
                    sink.send(Message::text(Frame::send(destination, body).encode())).await?;
                },
                Some(PushCommand::Stop) | None => {
                    // Best effort: the socket may already be gone.
                    let _ = sink.send(Message::text(Frame::disconnect().encode())).await;
                    let _ = sink.close().await;
                    return Ok(SessionEnd::Stopped);
                },
            },
        }
    }
}

/// Map a broker frame to an event. Frames that carry nothing for the
/// session (receipts, `ERROR`, undecodable bodies) are logged and yield `None`.
fn route(frame: &Frame) -> Option<PushEvent> {
    match frame.command {
        Command::Message => {},
        Command::Error => {
            tracing::error!(
                message = frame.get("message").unwrap_or_default(),
                details = %frame.body,
                "broker reported error"
            );
            return None;
        },
        other => {
            tracing::debug!(command = %other, "ignoring frame");
            return None;
        },
    }

    let topic = match frame.get("subscription") {
        Some("sub-private") => PRIVATE_TOPIC,
        Some("sub-room") => ROOM_TOPIC,
        Some("sub-errors") => ERROR_TOPIC,
        _ => frame.get("destination")?,
    };

    if topic == ERROR_TOPIC {
        tracing::error!(body = %frame.body, "server reported error");
        return Some(PushEvent::Error(frame.body.clone()));
    }

    let message: WireMessage = match serde_json::from_str(&frame.body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(topic, error = %e, "undecodable message body");
            return None;
        },
    };

    match topic {
        PRIVATE_TOPIC => Some(PushEvent::PrivateMessage(message)),
        ROOM_TOPIC => Some(PushEvent::RoomMessage(message)),
        _ => {
            tracing::debug!(topic, "message on unknown destination");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::{Friend, FriendStatus};

    use super::*;

    const BODY: &str = r#"{"id":3,"senderId":42,"senderName":"bob","recipientId":7,
        "recipientName":"ann","content":"yo","timestamp":"2024-01-01T00:01:00Z"}"#;

    fn message(headers: &[(&str, &str)], body: &str) -> Frame {
        headers
            .iter()
            .fold(Frame::new(Command::Message), |frame, (n, v)| frame.header(*n, *v))
            .body(body)
    }

    #[test]
    fn routes_by_subscription_then_destination() {
        let by_sub = route(&message(&[("subscription", "sub-room")], BODY));
        assert!(matches!(by_sub, Some(PushEvent::RoomMessage(m)) if m.content == "yo"));

        let by_dest = route(&message(&[("destination", PRIVATE_TOPIC)], BODY));
        assert!(matches!(by_dest, Some(PushEvent::PrivateMessage(m)) if m.sender_id == 42));
    }

    #[test]
    fn error_queue_yields_error_event() {
        let event = route(&message(&[("subscription", "sub-errors")], "recipient not found"));
        assert_eq!(event, Some(PushEvent::Error("recipient not found".into())));
    }

    #[test]
    fn broker_errors_and_garbage_are_dropped() {
        let error = Frame::new(Command::Error).header("message", "bad").body("details");
        assert_eq!(route(&error), None);
        assert_eq!(route(&message(&[("destination", PRIVATE_TOPIC)], "not json")), None);
        assert_eq!(route(&message(&[("destination", "/topic/other")], BODY)), None);
        assert_eq!(route(&message(&[], BODY)), None);
    }

    #[test]
    fn outgoing_body_shape() {
        let friend = Recipient::Friend(Friend {
            id: 42,
            name: "bob".into(),
            email: String::new(),
            status: FriendStatus::Online,
        });
        let body = serde_json::to_value(OutgoingMessage::text(&friend, "hi")).unwrap();
        assert_eq!(body, serde_json::json!({"id": 42, "content": "hi", "type": "TEXT"}));
    }
}
