//! Reply routing
//!
//! The [`Postmaster`] decides who receives each reply and with which IRC primitive, formats
//! the message for the wire and sends it. Replies tagged [`Destination::Command`] are
//! executed as command strings and their own replies delivered in their place.

mod format;

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::protocol::NickMask;
use crate::reply::{Destination, Reply};

pub use format::MessageFormatter;

/// How many times `command` replies may expand into further commands
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// The IRC primitive a reply is sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Message,
    Notice,
    Action,
}

/// Where a reply goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A nick or channel on the wire
    Recipient(String),
    /// Back into the command executor
    Command,
}

/// The primitive used to send a reply, or `None` for command replies
pub fn handler_for(reply: &Reply) -> Option<Primitive> {
    match reply.destination() {
        None | Some(Destination::Private) | Some(Destination::Public) => Some(Primitive::Message),
        Some(Destination::PrivateNotice) | Some(Destination::PublicNotice) => Some(Primitive::Notice),
        Some(Destination::PrivateAction)
        | Some(Destination::PublicAction)
        | Some(Destination::Action) => Some(Primitive::Action),
        Some(Destination::Command) => None,
    }
}

/// Resolve the recipient of a reply
///
/// Untagged replies and implicit actions go to the channel when the request was public
/// and to the caller's nick otherwise.
pub fn destination_for(reply: &Reply, source: &NickMask, channel: &str, public: bool) -> Route {
    let default = || {
        if public {
            Route::Recipient(channel.to_string())
        } else {
            Route::Recipient(source.nick.clone())
        }
    };

    match reply.destination() {
        None | Some(Destination::Action) => default(),
        Some(Destination::Private)
        | Some(Destination::PrivateNotice)
        | Some(Destination::PrivateAction) => Route::Recipient(source.nick.clone()),
        Some(Destination::Public)
        | Some(Destination::PublicNotice)
        | Some(Destination::PublicAction) => Route::Recipient(channel.to_string()),
        Some(Destination::Command) => Route::Command,
    }
}

/// Delivers replies to their destinations
#[derive(Debug, Clone)]
pub struct Postmaster {
    formatter: MessageFormatter,
    max_depth: usize,
}

impl Default for Postmaster {
    fn default() -> Self {
        Postmaster::new(DEFAULT_MAX_DEPTH)
    }
}

impl Postmaster {
    /// Create a new postmaster
    ///
    /// # Arguments
    /// * `max_depth` - How deeply `command` replies may nest before they are dropped
    pub fn new(max_depth: usize) -> Self {
        Postmaster {
            formatter: MessageFormatter::new(),
            max_depth,
        }
    }

    /// Deliver replies in order
    ///
    /// Command replies are expanded in place through a work queue rather than by
    /// recursion. Send failures are logged and do not stop the remaining deliveries.
    pub async fn deliver(
        &self,
        connection: &Arc<Connection>,
        replies: Reply,
        source: &NickMask,
        channel: &str,
        public: bool,
    ) {
        let mut queue: VecDeque<(Reply, usize)> =
            replies.into_vec().into_iter().map(|reply| (reply, 0)).collect();

        while let Some((reply, depth)) = queue.pop_front() {
            let Some(message) = reply.message() else {
                continue;
            };

            let recipient = match destination_for(&reply, source, channel, public) {
                Route::Recipient(recipient) => recipient,
                Route::Command => {
                    if depth >= self.max_depth {
                        warn!(
                            "Dropping command reply \"{}\" nested {} levels deep",
                            message, depth
                        );
                        continue;
                    }

                    info!("Attempting to execute a command from a response message");
                    let expanded = connection.execute(message, source, public).await;
                    for reply in expanded.into_vec().into_iter().rev() {
                        queue.push_front((reply, depth + 1));
                    }
                    continue;
                }
            };

            let message = self.formatter.format(message);
            let transport = connection.transport();
            let result = match handler_for(&reply) {
                Some(Primitive::Notice) => transport.notice(&recipient, &message).await,
                Some(Primitive::Action) => transport.action(&recipient, &message).await,
                _ => transport.privmsg(&recipient, &message).await,
            };

            match result {
                Ok(()) => debug!("Delivered message to {}", recipient),
                Err(e) => error!("Failed to deliver message to {}: {}", recipient, e),
            }
        }
    }
}
