//! One-shot subcommands: sign in, run one REST call, print the result.

use std::io::Write;

use murmur_client::ApiClient;
use murmur_core::{ApiError, FriendRequests, RequestResponse, RoomType, SendRequestOutcome};

use crate::{CliError, render};

/// Sign in, mapping a 401 to [`CliError::SignInRefused`].
pub async fn sign_in(api: &ApiClient, username: &str, password: &str) -> Result<(), CliError> {
    match api.login(username, password).await {
        Ok(()) => {
            tracing::info!(%username, "signed in");
            Ok(())
        },
        Err(ApiError::Unauthorized) => Err(CliError::SignInRefused),
        Err(e) => Err(e.into()),
    }
}

/// Create an account.
pub async fn register(
    api: &ApiClient,
    username: &str,
    email: &str,
    password: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    api.register(username, email, password).await?;
    writeln!(out, "Registered {username}. You can sign in now.")?;
    Ok(())
}

/// Print friends with their presence.
pub async fn friends(api: &ApiClient, out: &mut impl Write) -> Result<(), CliError> {
    let friends = api.friends().await?;
    if friends.is_empty() {
        writeln!(out, "No friends yet. Send a request with `murmur add-friend NAME`.")?;
    }
    for friend in friends {
        writeln!(out, "{} ({:?})", friend.name, friend.status)?;
    }
    Ok(())
}

/// Print pending requests in both directions.
pub async fn requests(api: &ApiClient, out: &mut impl Write) -> Result<(), CliError> {
    let requests = FriendRequests::from_payload(api.friend_requests().await?);
    if requests.is_empty() {
        writeln!(out, "No pending requests.")?;
    }
    for request in requests.incoming().iter().chain(requests.outgoing()) {
        writeln!(out, "{}", render::request_line(request))?;
    }
    Ok(())
}

/// Send a friend request and print the outcome.
pub async fn add_friend(
    api: &ApiClient,
    username: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let outcome = SendRequestOutcome::from_result(&api.send_friend_request(username).await);
    if !outcome.is_success() {
        return Err(CliError::Refused(outcome.message().to_owned()));
    }
    writeln!(out, "{}", outcome.message())?;
    Ok(())
}

/// Unfriend someone.
pub async fn remove_friend(
    api: &ApiClient,
    name: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match api.remove_friend(name).await {
        Ok(()) => {
            writeln!(out, "Removed {name} from your friends.")?;
            Ok(())
        },
        Err(ApiError::NotFound) => Err(CliError::Refused(format!("{name} is not your friend."))),
        Err(e) => Err(e.into()),
    }
}

/// Answer or withdraw a pending request.
pub async fn respond(
    api: &ApiClient,
    id: u64,
    response: RequestResponse,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let requests = FriendRequests::from_payload(api.friend_requests().await?);
    let Some(request) = requests.get(id) else {
        return Err(CliError::Refused(format!("No pending request {id}.")));
    };
    if !response.applies_to(request.direction) {
        return Err(CliError::Refused(format!("Cannot {} request {id}.", response.as_str())));
    }

    let username = &request.username;
    match response {
        RequestResponse::Accept => {
            let reply = api.respond_to_request(id, true).await?;
            let friend = reply.username.as_deref().unwrap_or(username);
            writeln!(out, "You are now friends with {friend}.")?;
        },
        RequestResponse::Reject => {
            api.respond_to_request(id, false).await?;
            writeln!(out, "Rejected the request from {username}.")?;
        },
        RequestResponse::Delete => {
            api.delete_request(id).await?;
            writeln!(out, "Withdrew the request to {username}.")?;
        },
        RequestResponse::Block => {
            api.block_user(username).await?;
            writeln!(out, "Blocked {username}.")?;
        },
    }
    Ok(())
}

/// Print the user's rooms.
pub async fn rooms(api: &ApiClient, out: &mut impl Write) -> Result<(), CliError> {
    let rooms = api.rooms().await?;
    if rooms.is_empty() {
        writeln!(out, "No rooms yet.")?;
    }
    for room in &rooms {
        writeln!(out, "{}", render::room_line(room))?;
    }
    Ok(())
}

/// Create a room and print its id.
pub async fn create_room(
    api: &ApiClient,
    name: &str,
    description: &str,
    room_type: RoomType,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let id = api.create_room(name, description, room_type).await?;
    writeln!(out, "Created room #{id} {name}.")?;
    Ok(())
}

/// Print a room's invite code.
pub async fn invite_code(
    api: &ApiClient,
    room_id: u64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let code = api.invite_code(room_id).await?;
    writeln!(out, "{code}")?;
    Ok(())
}

/// Add a friend to a room by friend name.
pub async fn invite_friend(
    api: &ApiClient,
    room_id: u64,
    friend_name: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let friend = api.friend_info(friend_name).await?;
    api.add_friend_to_room(room_id, friend.id).await?;
    writeln!(out, "Added {} to room #{room_id}.", friend.name)?;
    Ok(())
}
