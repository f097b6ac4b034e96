//! murmur chat client binary.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session (credentials may also come from .env)
//! murmur --username ann --password hunter2 chat
//!
//! # One-shot commands
//! murmur requests
//! murmur respond 12 accept
//! murmur remove-friend bob
//! murmur --api-url https://chat.example.com rooms
//! ```

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use murmur_app::Runtime;
use murmur_cli::{CliError, TerminalDriver, commands};
use murmur_client::{
    ApiClient, ClientConfig, SystemEnv,
    config::{DEFAULT_API_URL, DEFAULT_WS_URL},
};
use murmur_core::{RequestResponse, RoomType};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// murmur chat client
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(about = "Terminal client for murmur chat")]
#[command(version)]
struct Args {
    /// REST base URL
    #[arg(long, env = "MURMUR_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// STOMP WebSocket URL
    #[arg(long, env = "MURMUR_WS_URL", default_value = DEFAULT_WS_URL, global = true)]
    ws_url: String,

    /// Account name
    #[arg(short, long, env = "MURMUR_USERNAME", global = true)]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "MURMUR_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and chat interactively
    Chat,
    /// Create an account
    Register {
        /// Email address
        #[arg(long)]
        email: String,
    },
    /// List friends
    Friends,
    /// List pending friend requests
    Requests,
    /// Send a friend request
    AddFriend {
        /// Who to befriend
        username: String,
    },
    /// Remove a friend
    RemoveFriend {
        /// Who to unfriend
        username: String,
    },
    /// Answer or withdraw a pending request
    Respond {
        /// Request id (see `requests`)
        id: u64,
        /// accept, reject, block or delete
        response: RequestResponse,
    },
    /// List rooms
    Rooms,
    /// Create a room
    CreateRoom {
        /// Room name
        name: String,
        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,
        /// Invite only
        #[arg(long)]
        private: bool,
    },
    /// Print a room's invite code
    InviteCode {
        /// Room id
        room_id: u64,
    },
    /// Add a friend to a room
    Invite {
        /// Room id
        room_id: u64,
        /// Friend name
        friend: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the chat; logs go to stderr.
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = ClientConfig::default().with_api_url(&args.api_url).with_ws_url(&args.ws_url);
    tracing::debug!(api_url = %config.api_url, ws_url = %config.ws_url, "murmur starting");

    let api = ApiClient::new(&config.api_url)?;
    let (Some(username), Some(password)) = (args.username, args.password) else {
        return Err(CliError::MissingCredentials.into());
    };

    let mut out = io::stdout();
    if let Command::Register { email } = &args.command {
        commands::register(&api, &username, email, &password, &mut out).await?;
        return Ok(());
    }

    commands::sign_in(&api, &username, &password).await?;
    match args.command {
        Command::Chat => {
            writeln!(out, "Signed in as {username}. Type /help for commands.")?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            let driver = TerminalDriver::new(input, io::stdout(), SystemEnv);
            let runtime = Runtime::new(driver, SystemEnv, api.clone(), config);
            runtime.run().await.map_err(CliError::from)?;
        },
        Command::Register { .. } => {},
        Command::Friends => commands::friends(&api, &mut out).await?,
        Command::Requests => commands::requests(&api, &mut out).await?,
        Command::AddFriend { username } => commands::add_friend(&api, &username, &mut out).await?,
        Command::RemoveFriend { username } => {
            commands::remove_friend(&api, &username, &mut out).await?;
        },
        Command::Respond { id, response } => commands::respond(&api, id, response, &mut out).await?,
        Command::Rooms => commands::rooms(&api, &mut out).await?,
        Command::CreateRoom { name, description, private } => {
            let room_type = if private { RoomType::Private } else { RoomType::Public };
            commands::create_room(&api, &name, &description, room_type, &mut out).await?;
        },
        Command::InviteCode { room_id } => commands::invite_code(&api, room_id, &mut out).await?,
        Command::Invite { room_id, friend } => {
            commands::invite_friend(&api, room_id, &friend, &mut out).await?;
        },
    }

    if let Err(e) = api.logout().await {
        tracing::debug!(error = %e, "logout failed");
    }
    Ok(())
}
