//! Application layer for the murmur chat client
//!
//! A pure session state machine plus a generic runtime that wires it to the
//! REST fetchers, the push channel and a frontend.
//!
//! # Components
//!
//! - [`Session`]: session state machine (hydration, live delivery, requests)
//! - [`Driver`]: trait for frontend I/O
//! - [`Runtime`]: async orchestration loop using a Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod driver;
mod event;
mod runtime;
mod session;
mod state;

pub use action::SessionAction;
pub use driver::Driver;
pub use event::{SessionEvent, UserCommand};
pub use runtime::{ChannelNotifier, Runtime, RuntimeError};
pub use session::Session;
pub use state::{PushState, Resource, ResourceStatus};
