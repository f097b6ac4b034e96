//! Terminal client for murmur chat
//!
//! A thin shell over [`murmur_app::Driver`]: line input in, plain text out.
//! All orchestration lives in the generic [`murmur_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod error;
pub mod input;
pub mod render;
pub mod terminal;

pub use error::CliError;
pub use input::{Input, InputError, parse_line};
pub use terminal::TerminalDriver;
