//! I/O layer for the murmur chat client
//!
//! Everything here touches the network or the runtime; the decisions it acts
//! on come from [`murmur_core`].
//!
//! # Components
//!
//! - [`ApiClient`]: REST calls with a cookie session and a 401 sign-out signal
//! - [`PushChannel`]: STOMP-over-WebSocket subscription and publishing
//! - [`ReconnectingFetcher`]: async driver for the retry state machine
//! - [`SystemEnv`]: production [`Environment`] on the tokio clock
//! - [`ClientConfig`]: endpoints and retry policy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod config;
pub mod fetcher;
pub mod push;
pub mod stomp;
pub mod system_env;

pub use api::{ApiClient, MessageSnapshot, RespondReply};
pub use config::ClientConfig;
pub use fetcher::ReconnectingFetcher;
pub use murmur_core::env::Environment;
pub use push::{OutgoingMessage, PushChannel, PushError, PushEvent};
pub use system_env::SystemEnv;
