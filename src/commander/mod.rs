//! Command execution and event broadcasting
//!
//! The [`Commander`] turns command strings into handler calls: it parses the string,
//! resolves the plugin, walks the privilege ladder (admin, user, public) and converts
//! whatever the handler returns or fails with into a [`Reply`]. It also fans protocol
//! events out to every plugin that listens for them.

pub mod command;
pub mod parser;

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::connection::Connection;
use crate::errors::{CommandError, DispatchError};
use crate::plugins::{CommandHandler, EventHandler, PluginRegistry, Tier};
use crate::protocol::{EventName, IrcEvent, NickMask};
use crate::reply::Reply;
use crate::validator::ValidationError;

pub use command::Command;
pub use parser::{CommandParser, OptValue, Options, ParsedCommand, Syntax, Trigger};

/// Shown to the caller when a handler fails in a way it did not anticipate
pub const UNKNOWN_ERROR: &str = "An unknown error occurred while trying to process your request";

const QUOTING_ERROR: &str =
    "I could not understand that command, please check your quoting and try again";

const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches commands and events to plugin handlers
pub struct Commander {
    parser: CommandParser,
    handler_timeout: Duration,
}

impl Default for Commander {
    fn default() -> Self {
        Commander::new(CommandParser::default(), DEFAULT_HANDLER_TIMEOUT)
    }
}

impl Commander {
    /// Create a new commander
    ///
    /// # Arguments
    /// * `parser` - The command-string parser
    /// * `handler_timeout` - How long a single handler may run before it is abandoned
    pub fn new(parser: CommandParser, handler_timeout: Duration) -> Self {
        Commander {
            parser,
            handler_timeout,
        }
    }

    pub fn trigger(&self) -> &Trigger {
        self.parser.trigger()
    }

    /// See [`CommandParser::filter_command_string`]
    pub fn filter_command_string(&self, command_string: &str, registry: &PluginRegistry) -> (String, bool) {
        self.parser.filter_command_string(command_string, registry)
    }

    /// Execute a command string on behalf of `source`
    ///
    /// # Returns
    /// The replies to deliver; `Reply::None` when no plugin or handler answered
    pub async fn execute(
        &self,
        connection: &Arc<Connection>,
        command_string: &str,
        source: &NickMask,
        public: bool,
    ) -> Reply {
        let (args, opts) = match self.parser.parse_command_string(command_string) {
            Ok(parsed) => parsed,
            Err(e) => {
                info!("Unable to parse command string from {}: {}", source.nick, e);
                return Reply::text(QUOTING_ERROR);
            }
        };

        let parsed = {
            let registry = connection.plugins.read().await;
            match self.parser.parse_arguments(args, &registry) {
                Ok(parsed) => parsed,
                Err(DispatchError::PluginNotLoaded(plugin)) => {
                    info!(
                        "Attempted to execute a command from a plugin that is not loaded or does not exist: {}",
                        plugin
                    );
                    return Reply::None;
                }
                Err(e) => {
                    info!("Unable to dispatch command from {}: {}", source.nick, e);
                    return Reply::text(QUOTING_ERROR);
                }
            }
        };

        if parsed.help_requested {
            let registry = connection.plugins.read().await;
            return registry.help(&parsed.plugin, parsed.command.as_deref());
        }

        let Some(command_name) = parsed.command.as_deref() else {
            debug!("No command given for plugin {}", parsed.plugin);
            return Reply::None;
        };

        let mut tiers = Vec::with_capacity(3);
        if let Ok(user) = connection.auth.current_user(&source.host, connection.network.id) {
            if connection.auth.is_admin(&user) {
                tiers.push(Tier::Admin);
            }
            tiers.push(Tier::User);
        }
        tiers.push(Tier::Public);

        for tier in tiers {
            let reply = self
                .execute_tier(connection, tier, &parsed, command_name, &opts, source, public)
                .await;
            if !reply.is_empty() {
                return reply;
            }
            debug!("No {} reply for {}, falling through", tier, command_name);
        }

        Reply::None
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_tier(
        &self,
        connection: &Arc<Connection>,
        tier: Tier,
        parsed: &ParsedCommand,
        command_name: &str,
        opts: &Options,
        source: &NickMask,
        public: bool,
    ) -> Reply {
        let handler = {
            let registry = connection.plugins.read().await;
            match registry.get(&parsed.plugin) {
                Ok(plugin) => plugin.get_command(command_name, tier),
                Err(_) => None,
            }
        };
        let Some(handler) = handler else {
            return Reply::None;
        };

        let syntax = self.parser.parse_syntax(handler.help());
        let command = Command::new(
            connection.clone(),
            parsed.args.clone(),
            opts.clone(),
            source.clone(),
            public,
            syntax.usage,
        );

        if command.args.len() < syntax.required_args {
            info!("Not enough arguments supplied to execute {}", command_name);
            return CommandError::not_enough_arguments(&command, Some(syntax.required_args))
                .to_reply();
        }

        debug!("Executing {} command {} {}", tier, parsed.plugin, command_name);
        match run_isolated(handler, command, self.handler_timeout).await {
            Ok(reply) => reply,
            Err(e) => reply_for_error(&e, &parsed.args, opts),
        }
    }

    /// Fire an event for every plugin that handles it
    ///
    /// Handler failures are logged and skipped. Nothing fires for command requests.
    pub async fn fire(&self, connection: &Arc<Connection>, event_name: EventName, event: &IrcEvent) -> Vec<Reply> {
        if event.text().is_some_and(|text| self.trigger().matches(text)) {
            debug!("Not firing events for command requests");
            return Vec::new();
        }

        debug!("Firing {}", event_name);

        let handlers: Vec<(String, Arc<dyn EventHandler>)> = {
            let registry = connection.plugins.read().await;
            registry
                .all()
                .iter()
                .filter(|plugin| plugin.has_events())
                .filter_map(|plugin| {
                    plugin
                        .get_event(event_name)
                        .map(|handler| (plugin.name().to_string(), handler))
                })
                .collect()
        };

        let mut replies = Vec::new();
        for (plugin, handler) in handlers {
            let event = event.clone();
            let connection = connection.clone();
            let task = tokio::task::spawn_blocking(move || handler.handle(&event, &connection));

            match isolate(task, self.handler_timeout).await {
                Ok(reply) if !reply.is_empty() => replies.push(reply),
                Ok(_) => {}
                Err(e) => error!("Plugin {} failed to handle {}: {:#}", plugin, event_name, e),
            }
        }

        debug!("Returning {} event replies", replies.len());
        replies
    }
}

/// Run a command handler on the blocking pool, bounded by `limit`
///
/// Panics and timeouts are reported as errors like any other failure.
pub(crate) async fn run_isolated(
    handler: Arc<dyn CommandHandler>,
    command: Command,
    limit: Duration,
) -> Result<Reply> {
    let task = tokio::task::spawn_blocking(move || handler.execute(&command));
    isolate(task, limit).await
}

async fn isolate(task: tokio::task::JoinHandle<Result<Reply>>, limit: Duration) -> Result<Reply> {
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(anyhow!("handler panicked: {}", e)),
        Err(_) => Err(anyhow!("handler timed out after {:?}", limit)),
    }
}

/// Turn a handler failure into the reply shown to the caller
pub(crate) fn reply_for_error(error: &anyhow::Error, args: &[String], opts: &Options) -> Reply {
    if let Some(e) = error.downcast_ref::<CommandError>() {
        info!("Command raised an exception: {}", e);
        return e.to_reply();
    }

    if let Some(e) = error.downcast_ref::<ValidationError>() {
        info!("Validation exception raised: {}", e);
        return Reply::text(e.message.clone());
    }

    error!(
        "Uncaught exception raised when executing a plugin command (Args: {:?}, Opts: {:?}): {:#}",
        args, opts, error
    );
    Reply::text(UNKNOWN_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CommandErrorKind;
    use crate::plugins::{Plugin, command_fn, event_fn};
    use crate::reply::Destination;
    use crate::test_helpers::{ADMIN_EMAIL, USER_EMAIL, login, test_connection, test_source};

    fn tiered_plugin() -> Plugin {
        Plugin::new("tiered")
            .command(Tier::Admin, "who", command_fn("", |_| Ok(Reply::text("admin"))))
            .command(Tier::User, "who", command_fn("", |_| Ok(Reply::text("user"))))
            .command(Tier::Public, "who", command_fn("", |_| Ok(Reply::text("public"))))
            .command(Tier::Admin, "quiet", command_fn("", |_| Ok(Reply::None)))
            .command(Tier::Public, "quiet", command_fn("", |_| Ok(Reply::text("public"))))
            .command(Tier::Admin, "mixed", command_fn("", |_| Ok(Reply::None)))
            .command(Tier::User, "mixed", command_fn("", |_| Ok(Reply::text("user"))))
            .command(Tier::Public, "mixed", command_fn("", |_| Ok(Reply::text("public"))))
            .command(
                Tier::Admin,
                "secret",
                command_fn("Syntax: tiered secret <key>", |_| Ok(Reply::text("classified"))),
            )
            .command(Tier::User, "members", command_fn("", |_| Ok(Reply::text("members only"))))
            .command(
                Tier::Public,
                "greet",
                command_fn("Greets someone\nSyntax: tiered greet <nick> [<message>]", |command| {
                    Ok(Reply::text(format!("hello {}", command.args[0])))
                }),
            )
            .command(
                Tier::Public,
                "fail",
                command_fn("", |command| {
                    Err(CommandError::invalid_syntax(command)
                        .with_destination(Destination::PrivateNotice)
                        .into())
                }),
            )
            .command(Tier::Public, "crash", command_fn("", |_| Err(anyhow!("boom"))))
            .command(Tier::Public, "panic", command_fn("", |_| panic!("handler panic")))
            .with_help("main", &["Tiered test plugin"])
            .with_help("who", &["Tells you which tier answered"])
            .with_help("secret", &["Administrators only"])
            .with_help("members", &["Logged in users only"])
    }

    async fn run(connection: &Arc<Connection>, command_string: &str) -> Reply {
        connection
            .execute(command_string, &test_source("Mako"), true)
            .await
    }

    #[tokio::test]
    async fn test_tier_precedence() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        assert_eq!(run(&connection, ">>> tiered who").await, Reply::text("public"));

        login(&connection, USER_EMAIL, "Mako");
        assert_eq!(run(&connection, ">>> tiered who").await, Reply::text("user"));

        connection.auth.logout("mako.example.net", connection.network.id).unwrap();
        login(&connection, ADMIN_EMAIL, "Mako");
        assert_eq!(run(&connection, ">>> tiered who").await, Reply::text("admin"));
    }

    #[tokio::test]
    async fn test_empty_admin_reply_falls_through() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);
        login(&connection, ADMIN_EMAIL, "Mako");

        assert_eq!(run(&connection, ">>> tiered quiet").await, Reply::text("public"));
    }

    #[tokio::test]
    async fn test_empty_admin_reply_falls_through_to_user() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        assert_eq!(run(&connection, ">>> tiered mixed").await, Reply::text("public"));

        login(&connection, ADMIN_EMAIL, "Mako");
        assert_eq!(run(&connection, ">>> tiered mixed").await, Reply::text("user"));
    }

    #[tokio::test]
    async fn test_help_for_privileged_commands_is_public() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        // Nobody is logged in, the commands themselves do not answer
        assert_eq!(run(&connection, ">>> tiered secret abc").await, Reply::None);
        assert_eq!(run(&connection, ">>> tiered members").await, Reply::None);

        assert_eq!(
            run(&connection, ">>> help tiered secret").await,
            Reply::text("Administrators only")
        );
        assert_eq!(
            run(&connection, ">>> tiered help members").await,
            Reply::text("Logged in users only")
        );
    }

    #[tokio::test]
    async fn test_help_bypasses_auth_and_arguments() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        assert_eq!(
            run(&connection, ">>> help tiered").await,
            Reply::text("Tiered test plugin")
        );
        assert_eq!(
            run(&connection, ">>> tiered help who").await,
            Reply::text("Tells you which tier answered")
        );
    }

    #[tokio::test]
    async fn test_not_enough_arguments_short_circuits() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        assert_eq!(
            run(&connection, ">>> tiered greet").await,
            Reply::text(
                "This command requires at least <strong>1</strong> arguments. Syntax: <strong>tiered greet <nick> [<message>]</strong>"
            )
        );
        assert_eq!(
            run(&connection, ">>> tiered greet Kiba").await,
            Reply::text("hello Kiba")
        );
    }

    #[tokio::test]
    async fn test_handler_failures_become_replies() {
        let mut registry = PluginRegistry::default();
        registry.register(tiered_plugin());
        let (connection, _) = test_connection(registry);

        let reply = run(&connection, ">>> tiered fail").await;
        assert_eq!(reply.destination(), Some(Destination::PrivateNotice));
        assert!(reply.message().unwrap().starts_with("Invalid syntax."));

        assert_eq!(run(&connection, ">>> tiered crash").await, Reply::text(UNKNOWN_ERROR));
        assert_eq!(run(&connection, ">>> tiered panic").await, Reply::text(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn test_unknown_plugin_and_bad_quoting() {
        let (connection, _) = test_connection(PluginRegistry::default());

        assert_eq!(run(&connection, ">>> nothing here").await, Reply::None);
        assert_eq!(
            run(&connection, r#">>> nothing "open"#).await,
            Reply::text(QUOTING_ERROR)
        );
    }

    #[tokio::test]
    async fn test_handler_timeout() {
        let plugin = Plugin::new("slow").command(
            Tier::Public,
            "sleep",
            command_fn("", |_| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(Reply::text("awake"))
            }),
        );
        let mut registry = PluginRegistry::default();
        registry.register(plugin);
        let (connection, _) = test_connection(registry);

        // The test connection allows handlers 100ms
        assert_eq!(run(&connection, ">>> slow sleep").await, Reply::text(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn test_fire_isolates_failures() {
        let mut registry = PluginRegistry::default();
        registry.register(
            Plugin::new("first").event(EventName::Join, event_fn(|_, _| Err(anyhow!("broken")))),
        );
        registry.register(
            Plugin::new("second").event(EventName::Join, event_fn(|_, _| panic!("also broken"))),
        );
        registry.register(Plugin::new("third").event(
            EventName::Join,
            event_fn(|event, _| Ok(Reply::text(format!("welcome {}", event.source.nick)))),
        ));
        registry.register(Plugin::new("silent").event(EventName::Join, event_fn(|_, _| Ok(Reply::None))));
        let (connection, _) = test_connection(registry);

        let event = IrcEvent::new(EventName::Join, test_source("Kiba"), "#nano", vec![]);
        let replies = connection.fire(EventName::Join, &event).await;

        assert_eq!(replies, vec![Reply::text("welcome Kiba")]);
    }

    #[tokio::test]
    async fn test_fire_skips_command_requests() {
        let mut registry = PluginRegistry::default();
        registry.register(Plugin::new("echo").event(
            EventName::PublicMessage,
            event_fn(|_, _| Ok(Reply::text("heard"))),
        ));
        let (connection, _) = test_connection(registry);

        let event = IrcEvent::new(
            EventName::PublicMessage,
            test_source("Kiba"),
            "#nano",
            vec![">>> echo".to_string()],
        );
        assert!(connection.fire(EventName::PublicMessage, &event).await.is_empty());
    }

    #[test]
    fn test_reply_for_error() {
        let opts = Options::new();

        let error: anyhow::Error = CommandError::permission_denied().into();
        let reply = reply_for_error(&error, &[], &opts);
        assert_eq!(
            reply,
            Reply::text("Access Denied. You do not have permission to perform the requested action.")
        );

        let error: anyhow::Error = crate::validator::validate_password("abc").unwrap_err().into();
        assert!(reply_for_error(&error, &[], &opts).message().unwrap().contains("6 characters"));

        let error = anyhow!("database exploded");
        assert_eq!(reply_for_error(&error, &[], &opts), Reply::text(UNKNOWN_ERROR));

        // Kinds survive the trip through anyhow
        let error: anyhow::Error =
            CommandError::new(CommandErrorKind::TooManyArguments, "too many").into();
        assert_eq!(
            error.downcast_ref::<CommandError>().map(|e| e.kind),
            Some(CommandErrorKind::TooManyArguments)
        );
    }
}
