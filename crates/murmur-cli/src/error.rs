//! CLI error type.

use std::io;

use murmur_app::RuntimeError;
use murmur_core::ApiError;
use thiserror::Error;

/// Errors surfaced by the `murmur` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// No username or password was given.
    #[error("missing credentials: use --username/--password or MURMUR_USERNAME/MURMUR_PASSWORD")]
    MissingCredentials,

    /// Sign-in was refused.
    #[error("sign-in failed: wrong username or password")]
    SignInRefused,

    /// The request was refused, locally or by the server.
    #[error("{0}")]
    Refused(String),

    /// REST call failed.
    #[error("request failed: {0}")]
    Api(#[from] ApiError),

    /// Interactive session failed.
    #[error("session failed: {0}")]
    Runtime(#[from] RuntimeError<io::Error>),

    /// Writing to the terminal failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
