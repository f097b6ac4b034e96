//! Runtime tests: a scripted driver against a local axum backend.
//!
//! The push endpoint points at a closed port, so the push channel keeps
//! reconnecting in the background while the REST side is exercised.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use murmur_app::{Driver, Resource, ResourceStatus, Runtime, Session, UserCommand};
use murmur_client::{ApiClient, ClientConfig, SystemEnv};
use murmur_core::{ConversationKind, Notification, RetryConfig};
use serde_json::json;
use tokio::sync::{mpsc, watch};

/// What the test observes from each render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct View {
    signed_in: bool,
    friends: usize,
    rooms: usize,
    incoming: usize,
    private_messages: usize,
    room_messages: usize,
    ready: usize,
}

impl View {
    fn of(session: &Session) -> Self {
        let count = |kind: ConversationKind| -> usize {
            session.store(kind).snapshot().values().map(Vec::len).sum()
        };
        Self {
            signed_in: session.user().is_some(),
            friends: session.friends().len(),
            rooms: session.rooms().len(),
            incoming: session.requests().incoming().len(),
            private_messages: count(ConversationKind::Private),
            room_messages: count(ConversationKind::Room),
            ready: Resource::ALL
                .into_iter()
                .filter(|resource| session.status(*resource) == ResourceStatus::Ready)
                .count(),
        }
    }
}

struct ScriptedDriver {
    commands: mpsc::UnboundedReceiver<UserCommand>,
    views: watch::Sender<View>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    stopped: Arc<AtomicU32>,
}

impl Driver for ScriptedDriver {
    type Error = std::io::Error;

    async fn next_command(&mut self) -> Result<Option<UserCommand>, Self::Error> {
        Ok(self.commands.recv().await)
    }

    fn render(&mut self, session: &Session) -> Result<(), Self::Error> {
        self.views.send_replace(View::of(session));
        Ok(())
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), Self::Error> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    commands: mpsc::UnboundedSender<UserCommand>,
    views: watch::Receiver<View>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    stopped: Arc<AtomicU32>,
}

fn runtime(api_url: &str) -> (Runtime<ScriptedDriver, SystemEnv>, Harness) {
    let (commands_tx, commands) = mpsc::unbounded_channel();
    let (views_tx, views) = watch::channel(View::default());
    let notifications = Arc::new(Mutex::new(Vec::new()));
    let stopped = Arc::new(AtomicU32::new(0));

    let driver = ScriptedDriver {
        commands,
        views: views_tx,
        notifications: Arc::clone(&notifications),
        stopped: Arc::clone(&stopped),
    };
    let mut config = ClientConfig::default()
        .with_api_url(api_url)
        .with_ws_url("ws://127.0.0.1:1/ws")
        .with_retry(RetryConfig {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            ..RetryConfig::default()
        });
    config.push_reconnect_delay = Duration::from_millis(50);

    let api = ApiClient::new(api_url).unwrap();
    let runtime = Runtime::new(driver, SystemEnv, api, config);
    (runtime, Harness { commands: commands_tx, views, notifications, stopped })
}

fn backend(friend_failures: u32, rooms_status: StatusCode) -> (Router, Arc<AtomicU32>) {
    let friend_calls = Arc::new(AtomicU32::new(0));
    let calls = Arc::clone(&friend_calls);

    let router = Router::new()
        .route(
            "/api/auth/me",
            get(|| async { Json(json!({"id": 7, "username": "ann", "email": "ann@example.com"})) }),
        )
        .route(
            "/api/friends/get-friends",
            get(move || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= friend_failures {
                        StatusCode::SERVICE_UNAVAILABLE.into_response()
                    } else {
                        Json(json!([{"id": 42, "name": "bob", "status": "ONLINE"}])).into_response()
                    }
                }
            }),
        )
        .route(
            "/api/friends/get-requests",
            get(|| async {
                Json(json!({"incoming": [{"id": 1, "username": "carol"}], "outgoing": []}))
            }),
        )
        .route(
            "/api/rooms/get-rooms",
            get(move || async move {
                if rooms_status.is_success() {
                    Json(json!([{"id": 300, "name": "rust", "type": "PUBLIC"}])).into_response()
                } else {
                    rooms_status.into_response()
                }
            }),
        )
        .route(
            "/api/get-pms",
            get(|| async {
                Json(json!({"messages": {"42": [
                    {"id": 1, "senderId": 42, "senderName": "bob", "recipientId": 7,
                     "recipientName": "ann", "content": "hi", "timestamp": "2024-01-01T00:00:00"},
                    {"id": 2, "senderId": 7, "senderName": "ann", "recipientId": 42,
                     "recipientName": "bob", "content": "hey", "timestamp": "2024-01-01T00:00:30"}
                ]}}))
            }),
        )
        .route(
            "/api/rooms/get-room-messages",
            get(|| async {
                Json(json!({"messages": {"300": [
                    {"id": 9, "senderId": 42, "senderName": "bob", "recipientId": 300,
                     "recipientName": "rust", "content": "welcome", "timestamp": "2024-01-01T00:00:00Z"}
                ]}}))
            }),
        );
    (router, friend_calls)
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future).await.expect("timed out")
}

#[tokio::test]
async fn hydrates_every_resource_then_quits() {
    let (router, _) = backend(0, StatusCode::OK);
    let (runtime, mut harness) = runtime(&serve(router).await);

    let control = async {
        let all_ready = |view: &View| view.ready == Resource::ALL.len();
        let view = harness.views.wait_for(all_ready).await.unwrap().clone();
        harness.commands.send(UserCommand::Quit).unwrap();
        view
    };
    let (result, view) = within(async { tokio::join!(runtime.run(), control) }).await;

    result.unwrap();
    assert_eq!(
        view,
        View {
            signed_in: true,
            friends: 1,
            rooms: 1,
            incoming: 1,
            private_messages: 2,
            room_messages: 1,
            ready: 5,
        }
    );
    assert_eq!(harness.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_recovers_through_backoff() {
    let (router, friend_calls) = backend(2, StatusCode::OK);
    let (runtime, mut harness) = runtime(&serve(router).await);

    let control = async {
        harness.views.wait_for(|view| view.friends == 1).await.unwrap();
        harness.commands.send(UserCommand::Quit).unwrap();
    };
    let (result, ()) = within(async { tokio::join!(runtime.run(), control) }).await;

    result.unwrap();
    assert_eq!(friend_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unauthorized_fetch_signs_out() {
    let (router, _) = backend(0, StatusCode::UNAUTHORIZED);
    let (runtime, harness) = runtime(&serve(router).await);

    // Ends on its own: no command is ever sent.
    within(runtime.run()).await.unwrap();

    assert!(!harness.views.borrow().signed_in);
    assert_eq!(harness.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closed_input_ends_the_session() {
    let (router, _) = backend(0, StatusCode::OK);
    let (runtime, harness) = runtime(&serve(router).await);
    drop(harness.commands);

    within(runtime.run()).await.unwrap();
    assert_eq!(harness.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn respond_with_wrong_direction_is_refused_locally() {
    let (router, _) = backend(0, StatusCode::OK);
    let (runtime, mut harness) = runtime(&serve(router).await);

    let control = async {
        harness.views.wait_for(|view| view.incoming == 1).await.unwrap();
        harness
            .commands
            .send(UserCommand::Respond { id: 1, response: murmur_core::RequestResponse::Delete })
            .unwrap();
        harness.commands.send(UserCommand::Quit).unwrap();
    };
    let (result, ()) = within(async { tokio::join!(runtime.run(), control) }).await;

    result.unwrap();
    let notifications = harness.notifications.lock().unwrap();
    assert!(notifications.iter().any(|n| n.message == "Cannot delete an incoming request."));
}
