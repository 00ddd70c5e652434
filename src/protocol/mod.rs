//! IRC protocol plumbing
//!
//! Translates wire messages from the `irc` crate into [`IrcEvent`]s for the dispatcher and
//! exposes the outgoing primitives through [`IrcTransport`].

mod client;
mod event;

pub use client::{IrcTransport, connect, run};
pub use event::{EventName, IrcEvent, NickMask, is_channel};
