//! Push channel tests against a minimal STOMP broker served by axum.

use std::time::Duration;

use axum::{
    Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, header},
    response::Response,
    routing::get,
};
use murmur_client::{PushChannel, PushEvent, SystemEnv};
use murmur_core::{Recipient, Room, RoomType};
use tokio::sync::mpsc;

const DELIVERY: &str = concat!(
    "MESSAGE\nsubscription:sub-private\ndestination:/user/queue/private-messages\nmessage-id:1\n\n",
    r#"{"id":5,"senderId":42,"senderName":"bob","recipientId":7,"recipientName":"ann","content":"yo","timestamp":"2024-01-01T00:01:00Z"}"#,
    "\0"
);

/// Broker behavior per connection.
#[derive(Clone, Copy)]
enum Script {
    /// Accept, deliver one message once subscribed, then echo nothing.
    Deliver,
    /// Accept and hang up right away.
    HangUp,
}

async fn broker(mut socket: WebSocket, script: Script, seen: mpsc::UnboundedSender<String>) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let text = text.as_str().to_owned();
        let _ = seen.send(text.clone());

        if text.starts_with("CONNECT\n") {
            let _ = socket.send(Message::Text("CONNECTED\nversion:1.2\n\n\0".into())).await;
            if let Script::HangUp = script {
                return;
            }
        } else if text.starts_with("SUBSCRIBE\n") && text.contains("id:sub-errors") {
            let _ = socket.send(Message::Text(DELIVERY.into())).await;
        }
    }
}

async fn serve(scripts: Vec<Script>) -> (String, mpsc::UnboundedReceiver<String>) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let scripts = std::sync::Arc::new(std::sync::Mutex::new(scripts.into_iter()));

    let app = Router::new().route(
        "/ws",
        get(move |ws: WebSocketUpgrade, headers: HeaderMap| {
            let seen = seen_tx.clone();
            let script = scripts.lock().unwrap().next().unwrap_or(Script::Deliver);
            async move {
                let cookie =
                    headers.get(header::COOKIE).and_then(|v| v.to_str().ok()).unwrap_or("");
                let _ = seen.send(format!("COOKIE {cookie}"));
                let response: Response = ws.on_upgrade(move |socket| broker(socket, script, seen));
                response
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("ws://{addr}/ws"), seen_rx)
}

async fn next_frame(seen: &mut mpsc::UnboundedReceiver<String>, prefix: &str) -> String {
    loop {
        let frame = seen.recv().await.unwrap();
        if frame.starts_with(prefix) {
            return frame;
        }
    }
}

#[tokio::test]
async fn subscribes_delivers_and_publishes() {
    let (url, mut seen) = serve(vec![Script::Deliver]).await;
    let (events_tx, mut events) = mpsc::channel(16);
    let channel = PushChannel::spawn(
        SystemEnv,
        url,
        Some("SESSION=abc123".into()),
        Duration::from_millis(50),
        events_tx,
    );

    assert_eq!(next_frame(&mut seen, "COOKIE").await, "COOKIE SESSION=abc123");
    assert!(next_frame(&mut seen, "CONNECT\n").await.contains("accept-version:1.2"));
    assert_eq!(events.recv().await, Some(PushEvent::Connected));

    match events.recv().await {
        Some(PushEvent::PrivateMessage(message)) => {
            assert_eq!(message.content, "yo");
            assert_eq!(message.id, Some(5));
        },
        other => panic!("expected private message, got {other:?}"),
    }

    let room = Recipient::Room(Room {
        id: 300,
        name: "rust".into(),
        description: String::new(),
        room_type: RoomType::Public,
        role: "MEMBER".into(),
    });
    channel.publish(&room, "hello room").unwrap();

    let send = next_frame(&mut seen, "SEND\n").await;
    assert!(send.contains("destination:/app/send-room-messages"));
    assert!(send.contains(r#"{"id":300,"content":"hello room","type":"TEXT"}"#));

    channel.stop();
    next_frame(&mut seen, "DISCONNECT").await;
}

#[tokio::test]
async fn reconnects_after_losing_the_socket() {
    let (url, _seen) = serve(vec![Script::HangUp, Script::Deliver]).await;
    let (events_tx, mut events) = mpsc::channel(16);
    let channel = PushChannel::spawn(SystemEnv, url, None, Duration::from_millis(20), events_tx);

    assert_eq!(events.recv().await, Some(PushEvent::Connected));
    assert_eq!(events.recv().await, Some(PushEvent::Disconnected));
    assert_eq!(events.recv().await, Some(PushEvent::Connected));
    assert!(matches!(events.recv().await, Some(PushEvent::PrivateMessage(_))));

    channel.stop();
}
