//! The live state of one IRC connection
//!
//! A [`Connection`] binds everything a dispatch needs: the network it is on, the plugin
//! registry, the authentication gate, the WHOIS broker and the outgoing [`Transport`].
//! Incoming protocol events enter through [`Connection::handle_event`].

mod whois;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::{AuthGate, UserDirectory};
use crate::commander::Commander;
use crate::ignore::IgnoreList;
use crate::networks::Network;
use crate::plugins::PluginRegistry;
use crate::postmaster::Postmaster;
use crate::protocol::{EventName, IrcEvent, NickMask, is_channel};
use crate::reply::Reply;

pub use whois::{WhoisBroker, WhoisFields};

const DEFAULT_WHOIS_TIMEOUT: Duration = Duration::from_secs(15);

/// The outgoing primitives of an IRC connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a PRIVMSG
    async fn privmsg(&self, target: &str, message: &str) -> Result<()>;

    /// Send a NOTICE
    async fn notice(&self, target: &str, message: &str) -> Result<()>;

    /// Send a CTCP ACTION
    async fn action(&self, target: &str, message: &str) -> Result<()>;

    /// Request WHOIS information for a comma separated list of nicks
    async fn whois(&self, targets: &str) -> Result<()>;
}

/// A source of free-text replies for messages that are not commands
pub trait LanguageEngine: Send + Sync {
    fn get_reply(&self, source: &NickMask, message: &str) -> Reply;
}

/// One connection to an IRC network and the services bound to it
pub struct Connection {
    pub network: Network,
    /// The channel joined on connect; replies to non-channel events go here
    pub channel: String,
    pub nickname: String,
    pub plugins: Arc<RwLock<PluginRegistry>>,
    pub auth: Arc<AuthGate>,
    pub whois: WhoisBroker,
    pub ignore: Arc<IgnoreList>,
    pub commander: Commander,
    pub postmaster: Postmaster,
    language: Option<Arc<dyn LanguageEngine>>,
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Create a new connection with no plugins and an empty user directory
    ///
    /// # Arguments
    /// * `network` - The network this connection is on
    /// * `channel` - The channel joined on connect
    /// * `nickname` - The bot's nick
    /// * `transport` - The outgoing side of the connection
    /// * `commander` - The command executor and event broadcaster
    pub fn new<C, N>(
        network: Network,
        channel: C,
        nickname: N,
        transport: Arc<dyn Transport>,
        commander: Commander,
    ) -> Self
    where
        C: Into<String>,
        N: Into<String>,
    {
        Connection {
            network,
            channel: channel.into(),
            nickname: nickname.into(),
            plugins: Arc::new(RwLock::new(PluginRegistry::default())),
            auth: Arc::new(AuthGate::new(Arc::new(UserDirectory::default()))),
            whois: WhoisBroker::new(DEFAULT_WHOIS_TIMEOUT),
            ignore: Arc::new(IgnoreList::default()),
            commander,
            postmaster: Postmaster::default(),
            language: None,
            transport,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = Arc::new(RwLock::new(plugins));
        self
    }

    pub fn with_auth(mut self, auth: Arc<AuthGate>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_ignore_list(mut self, ignore: Arc<IgnoreList>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_postmaster(mut self, postmaster: Postmaster) -> Self {
        self.postmaster = postmaster;
        self
    }

    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois = WhoisBroker::new(timeout);
        self
    }

    pub fn with_language(mut self, language: Arc<dyn LanguageEngine>) -> Self {
        self.language = Some(language);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Execute a command string on behalf of `source`
    pub async fn execute(self: &Arc<Self>, command_string: &str, source: &NickMask, public: bool) -> Reply {
        self.commander.execute(self, command_string, source, public).await
    }

    /// Fire a plugin event and collect the replies
    pub async fn fire(self: &Arc<Self>, event_name: EventName, event: &IrcEvent) -> Vec<Reply> {
        self.commander.fire(self, event_name, event).await
    }

    /// Deliver replies through the postmaster
    pub async fn deliver<R: Into<Reply>>(
        self: &Arc<Self>,
        replies: R,
        source: &NickMask,
        channel: &str,
        public: bool,
    ) {
        self.postmaster
            .deliver(self, replies.into(), source, channel, public)
            .await;
    }

    /// Dispatch an incoming protocol event
    pub async fn handle_event(self: &Arc<Self>, event: IrcEvent) {
        match event.name {
            EventName::PublicMessage
            | EventName::PrivateMessage
            | EventName::PublicAction
            | EventName::PrivateAction => self.handle_message(event).await,
            event_name => {
                debug!("[{}] {} {}", event_name, event.source, event.target);
                let replies = self.fire(event_name, &event).await;
                if !replies.is_empty() {
                    let channel = self.reply_channel(&event);
                    self.deliver(replies, &event.source, &channel, true).await;
                }
            }
        }
    }

    /// Answer a message or action, either as a command or through the language engine
    ///
    /// When nothing answers, the matching plugin event is fired instead. Messages from
    /// sources on the ignore list are dropped before any of this.
    pub async fn handle_message(self: &Arc<Self>, event: IrcEvent) {
        if self.ignore.exists(&event.source) {
            info!("Not responding to a message from {}", event.source);
            return;
        }
        let Some(text) = event.text() else {
            return;
        };
        let public = event.is_public();
        let channel = self.reply_channel(&event);

        let replies = if self.commander.trigger().matches(text) {
            let (filtered, _) = {
                let registry = self.plugins.read().await;
                self.commander.filter_command_string(text, &registry)
            };
            info!(
                "Acknowledging {} command request from {}: {}",
                if public { "public" } else { "private" },
                event.source.nick,
                filtered
            );
            self.execute(text, &event.source, public).await
        } else if let Some(language) = &self.language {
            debug!("Querying language engine for a response to {}", event.source.nick);
            language.get_reply(&event.source, text)
        } else {
            Reply::None
        };

        if !replies.is_empty() {
            debug!("Delivering response messages");
            self.deliver(replies, &event.source, &channel, public).await;
            return;
        }

        let event_replies = self.fire(event.name, &event).await;
        if !event_replies.is_empty() {
            self.deliver(event_replies, &event.source, &channel, public)
                .await;
        }
    }

    fn reply_channel(&self, event: &IrcEvent) -> String {
        if is_channel(&event.target) {
            event.target.clone()
        } else {
            self.channel.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::IgnoreMask;
    use crate::plugins::{Plugin, Tier, command_fn, event_fn};
    use crate::test_helpers::{Sent, test_connection, test_source};

    fn message(name: EventName, target: &str, text: &str) -> IrcEvent {
        IrcEvent::new(name, test_source("Mako"), target, vec![text.to_string()])
    }

    fn echo_plugin() -> Plugin {
        Plugin::new("echo")
            .command(
                Tier::Public,
                "say",
                command_fn("Syntax: echo say <text>", |command| {
                    Ok(Reply::text(command.args.join(" ")))
                }),
            )
            .event(
                EventName::PublicMessage,
                event_fn(|event, _| Ok(Reply::text(format!("heard {}", event.text().unwrap_or_default())))),
            )
    }

    #[tokio::test]
    async fn test_command_message_is_answered() {
        let mut registry = PluginRegistry::default();
        registry.register(echo_plugin());
        let (connection, transport) = test_connection(registry);

        connection
            .handle_event(message(EventName::PublicMessage, "#nano", ">>> echo say hello world"))
            .await;

        assert_eq!(
            transport.sent(),
            vec![Sent::privmsg("#nano", "hello world")]
        );
    }

    #[tokio::test]
    async fn test_unanswered_message_fires_event() {
        let mut registry = PluginRegistry::default();
        registry.register(echo_plugin());
        let (connection, transport) = test_connection(registry);

        connection
            .handle_event(message(EventName::PublicMessage, "#nano", "just chatting"))
            .await;

        assert_eq!(
            transport.sent(),
            vec![Sent::privmsg("#nano", "heard just chatting")]
        );
    }

    #[tokio::test]
    async fn test_ignored_source_gets_no_reply() {
        let mut registry = PluginRegistry::default();
        registry.register(echo_plugin());
        let (connection, transport) = test_connection(registry);
        connection.ignore.add("mako.example.net", IgnoreMask::Host).unwrap();

        connection
            .handle_event(message(EventName::PublicMessage, "#nano", ">>> echo say hello"))
            .await;
        connection
            .handle_event(message(EventName::PublicMessage, "#nano", "just chatting"))
            .await;
        assert!(transport.sent().is_empty());

        // Other sources are still answered
        connection
            .handle_event(IrcEvent::new(
                EventName::PublicMessage,
                test_source("Kiba"),
                "#nano",
                vec![">>> echo say hello".to_string()],
            ))
            .await;
        assert_eq!(transport.sent(), vec![Sent::privmsg("#nano", "hello")]);
    }

    #[tokio::test]
    async fn test_language_engine_answers_free_text() {
        struct Parrot;

        impl LanguageEngine for Parrot {
            fn get_reply(&self, source: &NickMask, message: &str) -> Reply {
                Reply::text(format!("{}: {}", source.nick, message))
            }
        }

        let (connection, transport) = test_connection(PluginRegistry::default());
        let connection = Arc::new(
            Arc::try_unwrap(connection)
                .ok()
                .unwrap()
                .with_language(Arc::new(Parrot)),
        );

        connection
            .handle_event(message(EventName::PrivateMessage, "nano", "hi there"))
            .await;

        // Private replies go back to the caller
        assert_eq!(transport.sent(), vec![Sent::privmsg("Mako", "Mako: hi there")]);
    }
}
