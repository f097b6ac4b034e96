//! Friend-request bookkeeping and the outcome table of sending a request.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Whether the current user sent or received a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestDirection {
    /// Someone asked to befriend the current user.
    Incoming,
    /// The current user asked someone.
    Outgoing,
}

/// A pending request as serialized by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    /// Request id.
    pub id: u64,
    /// The other party's username.
    pub username: String,
}

/// A pending request with its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRequest {
    /// Request id.
    pub id: u64,
    /// The other party's username.
    pub username: String,
    /// Who sent it.
    pub direction: RequestDirection,
}

impl FriendRequest {
    /// Attach a direction to a wire request.
    pub fn new(data: RequestData, direction: RequestDirection) -> Self {
        Self { id: data.id, username: data.username, direction }
    }
}

/// Response body of `GET /api/friends/get-requests`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsPayload {
    /// Requests received.
    #[serde(default)]
    pub incoming: Vec<RequestData>,
    /// Requests sent.
    #[serde(default)]
    pub outgoing: Vec<RequestData>,
}

/// Pending requests partitioned by direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendRequests {
    incoming: Vec<FriendRequest>,
    outgoing: Vec<FriendRequest>,
}

impl FriendRequests {
    /// Partition a fetched payload. A repeated id keeps its last entry.
    pub fn from_payload(payload: RequestsPayload) -> Self {
        let mut requests = Self::default();
        let incoming = payload.incoming.into_iter().map(|data| (data, RequestDirection::Incoming));
        let outgoing = payload.outgoing.into_iter().map(|data| (data, RequestDirection::Outgoing));
        for (data, direction) in incoming.chain(outgoing) {
            requests.add(FriendRequest::new(data, direction));
        }
        requests
    }

    /// Requests received.
    pub fn incoming(&self) -> &[FriendRequest] {
        &self.incoming
    }

    /// Requests sent.
    pub fn outgoing(&self) -> &[FriendRequest] {
        &self.outgoing
    }

    /// Look a request up by id in either direction.
    pub fn get(&self, id: u64) -> Option<&FriendRequest> {
        self.incoming.iter().chain(&self.outgoing).find(|request| request.id == id)
    }

    /// Add a request to its direction's list. Replaces one with the same id.
    pub fn add(&mut self, request: FriendRequest) {
        let list = self.list_mut(request.direction);
        list.retain(|existing| existing.id != request.id);
        list.push(request);
    }

    /// Remove a request. Returns it if it was pending.
    pub fn remove(&mut self, id: u64, direction: RequestDirection) -> Option<FriendRequest> {
        let list = self.list_mut(direction);
        let index = list.iter().position(|request| request.id == id)?;
        Some(list.remove(index))
    }

    /// Total pending requests.
    pub fn len(&self) -> usize {
        self.incoming.len() + self.outgoing.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }

    fn list_mut(&mut self, direction: RequestDirection) -> &mut Vec<FriendRequest> {
        match direction {
            RequestDirection::Incoming => &mut self.incoming,
            RequestDirection::Outgoing => &mut self.outgoing,
        }
    }
}

/// What the user does with a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestResponse {
    /// Accept an incoming request.
    Accept,
    /// Reject an incoming request.
    Reject,
    /// Withdraw an outgoing request.
    Delete,
    /// Block the sender of an incoming request.
    Block,
}

impl RequestResponse {
    /// Whether this response applies to a request in `direction`.
    pub fn applies_to(self, direction: RequestDirection) -> bool {
        match self {
            Self::Accept | Self::Reject | Self::Block => direction == RequestDirection::Incoming,
            Self::Delete => direction == RequestDirection::Outgoing,
        }
    }

    /// Lowercase verb for logs and command parsing.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Delete => "delete",
            Self::Block => "block",
        }
    }
}

impl std::str::FromStr for RequestResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "delete" => Ok(Self::Delete),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown response {other:?}")),
        }
    }
}

/// Relationship state reported in a 409 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    /// A request is already pending.
    Pending,
    /// The users are already friends.
    Accepted,
    /// One side blocked the other.
    Blocked,
    /// Anything the client does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Body of a 409 from `POST /api/friends/send-req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictBody {
    /// Existing relationship.
    pub status: ConflictStatus,
    /// True if the current user initiated the existing relationship.
    pub outgoing: bool,
}

/// Interpreted result of sending a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRequestOutcome {
    /// Request created.
    Sent,
    /// No such user (404).
    UserNotFound,
    /// Request addressed to oneself (400).
    SelfRequest,
    /// Already pending; `outgoing` tells who sent it.
    AlreadyPending {
        /// Current user sent the pending request.
        outgoing: bool,
    },
    /// Already friends.
    AlreadyFriends,
    /// Blocked; `outgoing` tells who blocked whom.
    Blocked {
        /// Current user did the blocking.
        outgoing: bool,
    },
    /// 409 with an unrecognized status.
    UnknownConflict,
    /// Any other failure.
    Failed,
}

impl SendRequestOutcome {
    /// Classify the result of the REST call.
    pub fn from_result(result: &Result<(), ApiError>) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(ApiError::NotFound) => Self::UserNotFound,
            Err(ApiError::BadRequest) => Self::SelfRequest,
            Err(ApiError::Conflict(body)) => match body.status {
                ConflictStatus::Pending => Self::AlreadyPending { outgoing: body.outgoing },
                ConflictStatus::Accepted => Self::AlreadyFriends,
                ConflictStatus::Blocked => Self::Blocked { outgoing: body.outgoing },
                ConflictStatus::Unknown => Self::UnknownConflict,
            },
            Err(_) => Self::Failed,
        }
    }

    /// True only for [`SendRequestOutcome::Sent`].
    pub fn is_success(self) -> bool {
        self == Self::Sent
    }

    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::Sent => "Successfully sent friend request.",
            Self::UserNotFound => "User not found.",
            Self::SelfRequest => "You cannot send a friend request to yourself.",
            Self::AlreadyPending { outgoing: true } => {
                "You already sent a friend request to this user."
            },
            Self::AlreadyPending { outgoing: false } => {
                "This user has already sent you a friend request."
            },
            Self::AlreadyFriends => "You are already friends with this user.",
            Self::Blocked { outgoing: true } => "You have blocked this user.",
            Self::Blocked { outgoing: false } => "This user has blocked you.",
            Self::UnknownConflict => "An unknown error occurred. Please try again later.",
            Self::Failed => "An unknown error occurred.",
        }
    }
}
