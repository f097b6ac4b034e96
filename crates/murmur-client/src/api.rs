//! REST client for the chat backend.
//!
//! JSON over HTTP with cookie-based sessions: the login response sets a
//! session cookie in the client's jar and every later call (and the push
//! handshake, via [`ApiClient::cookie_header`]) sends it back.
//!
//! Status codes are interpreted in exactly one place, [`ApiError::from_status`].
//! A 401 from any endpoint additionally flips the unauthorized signal so the
//! session layer can sign out without every caller checking for it.

use std::{collections::HashMap, sync::Arc};

use murmur_core::{
    ApiError, ConversationKey, Friend, RequestsPayload, Room, RoomType, User, UserId, WireMessage,
};
use reqwest::{
    Client, RequestBuilder, Response, Url,
    cookie::{CookieStore, Jar},
    header::HeaderValue,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::watch;

/// Messages grouped by conversation key, as returned by the snapshot endpoints.
pub type MessageSnapshot = HashMap<ConversationKey, Vec<WireMessage>>;

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    messages: MessageSnapshot,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequestBody<'a> {
    recipient_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RespondBody {
    req_id: u64,
    accept: bool,
}

/// Reply to `POST /api/friends/respond-req`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RespondReply {
    /// Username of the other party; set when a request was accepted.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomBody<'a> {
    room_name: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    room_type: RoomType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomReply {
    room_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteCodeReply {
    invite_code: String,
}

/// REST client. Cheap to clone; clones share the cookie jar and the
/// unauthorized signal.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    jar: Arc<Jar>,
    unauthorized: Arc<watch::Sender<bool>>,
}

impl ApiClient {
    /// Create a client for `api_url` with an empty cookie jar.
    pub fn new(api_url: &str) -> Result<Self, ApiError> {
        let base =
            Url::parse(api_url).map_err(|e| ApiError::Transport(format!("invalid url: {e}")))?;
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let (unauthorized, _) = watch::channel(false);
        Ok(Self { http, base, jar, unauthorized: Arc::new(unauthorized) })
    }

    /// Receiver that flips to `true` when any call returns 401.
    pub fn unauthorized(&self) -> watch::Receiver<bool> {
        self.unauthorized.subscribe()
    }

    /// `Cookie` header value for the backend's host, if a session exists.
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        self.jar.cookies(&self.base)
    }

    /// `GET /api/auth/me`: the signed-in user.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get_json("/api/auth/me", &[]).await
    }

    /// `POST /api/auth/login`. Stores the session cookie on success.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        self.post("/api/auth/login", &[], &LoginBody { username, password }).await?;
        self.unauthorized.send_replace(false);
        tracing::info!(username, "logged in");
        Ok(())
    }

    /// `POST /api/auth/register`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        self.post("/api/auth/register", &[], &RegisterBody { username, email, password }).await?;
        Ok(())
    }

    /// `POST /api/auth/logout`.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post("/api/auth/logout", &[], &serde_json::json!({})).await?;
        Ok(())
    }

    /// `GET /api/friends/get-friends`.
    pub async fn friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.get_json("/api/friends/get-friends", &[]).await
    }

    /// `GET /api/friends/get-friend-info?friendName=`.
    pub async fn friend_info(&self, name: &str) -> Result<Friend, ApiError> {
        self.get_json("/api/friends/get-friend-info", &[("friendName", name)]).await
    }

    /// `GET /api/friends/get-requests`.
    pub async fn friend_requests(&self) -> Result<RequestsPayload, ApiError> {
        self.get_json("/api/friends/get-requests", &[]).await
    }

    /// `POST /api/friends/send-req`.
    ///
    /// Classify the result with [`murmur_core::SendRequestOutcome::from_result`].
    pub async fn send_friend_request(&self, username: &str) -> Result<(), ApiError> {
        self.post("/api/friends/send-req", &[], &SendRequestBody { recipient_name: username })
            .await?;
        Ok(())
    }

    /// `POST /api/friends/respond-req`: accept or reject an incoming request.
    pub async fn respond_to_request(
        &self,
        id: u64,
        accept: bool,
    ) -> Result<RespondReply, ApiError> {
        let response =
            self.post("/api/friends/respond-req", &[], &RespondBody { req_id: id, accept }).await?;
        decode_lenient(response).await
    }

    /// `DELETE /api/friends/respond-req?reqId=`: withdraw an outgoing request.
    pub async fn delete_request(&self, id: u64) -> Result<(), ApiError> {
        let id = id.to_string();
        let request =
            self.http.delete(self.url("/api/friends/respond-req")).query(&[("reqId", id)]);
        self.execute(request).await?;
        Ok(())
    }

    /// `POST /api/friends/block-user?username=`.
    pub async fn block_user(&self, username: &str) -> Result<(), ApiError> {
        self.post("/api/friends/block-user", &[("username", username)], &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// `POST /api/friends/remove-friend?friendName=`.
    pub async fn remove_friend(&self, name: &str) -> Result<(), ApiError> {
        self.post("/api/friends/remove-friend", &[("friendName", name)], &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// `GET /api/get-pms`: private message snapshot keyed by friend id.
    pub async fn private_messages(&self) -> Result<MessageSnapshot, ApiError> {
        let payload: SnapshotPayload = self.get_json("/api/get-pms", &[]).await?;
        Ok(payload.messages)
    }

    /// `GET /api/rooms/get-rooms`.
    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("/api/rooms/get-rooms", &[]).await
    }

    /// `GET /api/rooms/get-room-messages`: room message snapshot keyed by room id.
    pub async fn room_messages(&self) -> Result<MessageSnapshot, ApiError> {
        let payload: SnapshotPayload = self.get_json("/api/rooms/get-room-messages", &[]).await?;
        Ok(payload.messages)
    }

    /// `POST /api/rooms/create-room`. Returns the new room id.
    pub async fn create_room(
        &self,
        name: &str,
        description: &str,
        room_type: RoomType,
    ) -> Result<u64, ApiError> {
        let body = CreateRoomBody { room_name: name, description, room_type };
        let response = self.post("/api/rooms/create-room", &[], &body).await?;
        let reply: CreateRoomReply = decode(response).await?;
        Ok(reply.room_id)
    }

    /// `GET /api/rooms/get-invite-code?roomId=`.
    pub async fn invite_code(&self, room_id: u64) -> Result<String, ApiError> {
        let room_id = room_id.to_string();
        let reply: InviteCodeReply =
            self.get_json("/api/rooms/get-invite-code", &[("roomId", room_id.as_str())]).await?;
        Ok(reply.invite_code)
    }

    /// `POST /api/rooms/add-friend-to-room?roomId=&friendId=`.
    pub async fn add_friend_to_room(
        &self,
        room_id: u64,
        friend_id: UserId,
    ) -> Result<(), ApiError> {
        let (room_id, friend_id) = (room_id.to_string(), friend_id.to_string());
        self.post(
            "/api/rooms/add-friend-to-room",
            &[("roomId", room_id.as_str()), ("friendId", friend_id.as_str())],
            &serde_json::json!({}),
        )
        .await?;
        Ok(())
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self.execute(self.http.get(self.url(path)).query(query)).await?;
        decode(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<Response, ApiError> {
        self.execute(self.http.post(self.url(path)).query(query).json(body)).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_owned();
        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_status(status.as_u16(), &body);
        if error.is_unauthorized() {
            tracing::warn!(%url, "session rejected, signalling sign-out");
            self.unauthorized.send_replace(true);
        } else {
            tracing::debug!(%url, status = status.as_u16(), "request failed");
        }
        Err(error)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json().await.map_err(|e| ApiError::Decode(e.to_string()))
}

/// Decode a body that may be empty.
async fn decode_lenient<T: DeserializeOwned + Default>(response: Response) -> Result<T, ApiError> {
    let text = response.text().await.map_err(|e| ApiError::Transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_path() {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.url("/api/auth/me").as_str(), "http://localhost:8080/api/auth/me");

        let prefixed = ApiClient::new("http://host/chat/").unwrap();
        assert_eq!(prefixed.url("/api/get-pms").as_str(), "http://host/chat/api/get-pms");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::Transport(_))));
    }

    #[test]
    fn no_cookie_before_login() {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        assert!(client.cookie_header().is_none());
        assert!(!*client.unauthorized().borrow());
    }
}
