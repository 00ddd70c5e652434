use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::commander::parser::{OptValue, Options};
use crate::connection::{Connection, WhoisFields};
use crate::protocol::NickMask;
use crate::reply::Reply;

/// A single command invocation, handed to the command handler
///
/// Cloning is cheap; a clone can outlive the handler call, e.g. while waiting on a WHOIS
/// reply.
#[derive(Clone)]
pub struct Command {
    pub args: Vec<String>,
    pub opts: Options,
    pub source: NickMask,
    pub public: bool,
    /// Usage line from the handler's documentation
    pub syntax: Option<String>,
    /// Where untagged public replies go
    pub channel: String,
    connection: Arc<Connection>,
    runtime: Option<Handle>,
}

impl Command {
    pub fn new(
        connection: Arc<Connection>,
        args: Vec<String>,
        opts: Options,
        source: NickMask,
        public: bool,
        syntax: Option<String>,
    ) -> Self {
        Command {
            args,
            opts,
            source,
            public,
            syntax,
            channel: connection.channel.clone(),
            connection,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The positional argument at `index`
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn opt(&self, name: &str) -> Option<&OptValue> {
        self.opts.get(&name.to_lowercase())
    }

    /// Whether the option was given at all, as a toggle or with a value
    pub fn has_flag(&self, name: &str) -> bool {
        self.opt(name).is_some()
    }

    pub fn opt_value(&self, name: &str) -> Option<&str> {
        self.opt(name).and_then(OptValue::as_str)
    }

    /// Deliver replies outside of the normal return path
    ///
    /// Delivery happens on the runtime, so this is safe to call from a synchronous handler.
    pub fn deliver_response<R: Into<Reply>>(&self, replies: R) {
        let replies = replies.into();
        let Some(runtime) = &self.runtime else {
            warn!("No runtime available to deliver a response for {}", self.source.nick);
            return;
        };

        let command = self.clone();
        runtime.spawn(async move {
            command
                .connection
                .deliver(replies, &command.source, &command.channel, command.public)
                .await;
        });
    }

    /// Send a WHOIS for `targets` and deliver whatever `callback` makes of the reply
    ///
    /// Replies are correlated on the first nick of a comma separated `targets` list only:
    /// the callback runs when that nick's `RPL_ENDOFWHOIS` arrives and sees the fields
    /// collected for it, so lines for any further nicks are not passed on. When no response
    /// arrives within the connection's WHOIS timeout the request is dropped and the
    /// callback never runs.
    pub fn bind_whois<F>(&self, targets: &str, callback: F)
    where
        F: FnOnce(&Command, WhoisFields) -> Result<Reply> + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            warn!("No runtime available to send a WHOIS for {}", targets);
            return;
        };

        let command = self.clone();
        let targets = targets.to_string();
        let nick = targets.split(',').next().unwrap_or_default().trim().to_string();

        runtime.spawn(async move {
            let connection = command.connection.clone();
            let subscription = connection.whois.subscribe(&nick);

            debug!(
                "Executing WHOIS command for {} ({} nicks awaiting WHOIS replies)",
                targets,
                connection.whois.pending()
            );
            if let Err(e) = connection.transport().whois(&targets).await {
                error!("Failed to send WHOIS for {}: {}", targets, e);
                connection.whois.cancel(&nick, subscription.id);
                return;
            }

            let waiting = tokio::time::timeout(connection.whois.timeout(), subscription.receiver);
            let fields = match waiting.await {
                Ok(Ok(fields)) => fields,
                Ok(Err(_)) => {
                    debug!("WHOIS request for {} was cancelled", nick);
                    return;
                }
                Err(_) => {
                    warn!("WHOIS request for {} timed out", nick);
                    connection.whois.cancel(&nick, subscription.id);
                    return;
                }
            };

            match callback(&command, fields) {
                Ok(replies) => {
                    connection
                        .deliver(replies, &command.source, &command.channel, command.public)
                        .await
                }
                Err(e) => error!("WHOIS callback for {} failed: {}", nick, e),
            }
        });
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("args", &self.args)
            .field("opts", &self.opts)
            .field("source", &self.source)
            .field("public", &self.public)
            .field("syntax", &self.syntax)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
