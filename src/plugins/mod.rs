//! Plugins and the registry of loaded plugins
//!
//! A [`Plugin`] is a named table of command handlers keyed by privilege [`Tier`] and
//! command name, plus a table of protocol event handlers and optional help entries.
//!
//! # Tiers
//!
//! A command may be registered once per tier. When a command runs, the commander tries the
//! admin tier first (administrators only), then the user tier (logged-in users only), then
//! the public tier. **A privileged handler that returns an empty reply falls through to the
//! next tier**, so return something (an error or a message) when a privileged handler has
//! handled the request and the lower tiers must not run.
//!
//! Handlers are synchronous and run on the blocking thread pool. Use
//! [`Command::deliver_response`](crate::commander::Command::deliver_response) to send
//! replies outside of the return value.

pub mod admin;
pub mod auth;
pub mod datetime;
pub mod greeter;
pub mod info;

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::commander::Command;
use crate::connection::Connection;
use crate::errors::DispatchError;
use crate::protocol::{EventName, IrcEvent};
use crate::reply::Reply;

/// The privilege tier a command handler is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Admin,
    User,
    Public,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Admin => "admin",
            Tier::User => "user",
            Tier::Public => "public",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handles one command of a plugin
pub trait CommandHandler: Send + Sync {
    /// Execute the command
    ///
    /// # Returns
    /// The replies to deliver. Errors of type [`CommandError`](crate::errors::CommandError)
    /// or [`ValidationError`](crate::validator::ValidationError) are shown to the caller;
    /// anything else is logged and reported as an unknown error.
    fn execute(&self, command: &Command) -> Result<Reply>;

    /// Documentation for the command
    ///
    /// A line of the form `Syntax: <usage>` sets the usage shown in error messages, and each
    /// `<placeholder>` in it that is not wrapped in brackets is a required argument.
    fn help(&self) -> &str {
        ""
    }
}

/// Handles one protocol event for a plugin
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &IrcEvent, connection: &Arc<Connection>) -> Result<Reply>;
}

/// A command handler backed by a closure
pub struct FnCommand<F> {
    doc: String,
    handler: F,
}

impl<F> CommandHandler for FnCommand<F>
where
    F: Fn(&Command) -> Result<Reply> + Send + Sync,
{
    fn execute(&self, command: &Command) -> Result<Reply> {
        (self.handler)(command)
    }

    fn help(&self) -> &str {
        &self.doc
    }
}

/// Wrap a closure as a command handler with the given documentation
pub fn command_fn<F>(doc: &str, handler: F) -> Arc<dyn CommandHandler>
where
    F: Fn(&Command) -> Result<Reply> + Send + Sync + 'static,
{
    Arc::new(FnCommand {
        doc: doc.to_string(),
        handler,
    })
}

/// An event handler backed by a closure
pub struct FnEvent<F>(F);

impl<F> EventHandler for FnEvent<F>
where
    F: Fn(&IrcEvent, &Arc<Connection>) -> Result<Reply> + Send + Sync,
{
    fn handle(&self, event: &IrcEvent, connection: &Arc<Connection>) -> Result<Reply> {
        (self.0)(event, connection)
    }
}

/// Wrap a closure as an event handler
pub fn event_fn<F>(handler: F) -> Arc<dyn EventHandler>
where
    F: Fn(&IrcEvent, &Arc<Connection>) -> Result<Reply> + Send + Sync + 'static,
{
    Arc::new(FnEvent(handler))
}

/// A named set of commands, events and help entries
pub struct Plugin {
    name: String,
    commands: HashMap<(Tier, String), Arc<dyn CommandHandler>>,
    events: HashMap<EventName, Arc<dyn EventHandler>>,
    help: HashMap<String, Vec<String>>,
}

impl Plugin {
    /// Create an empty plugin; sub-plugins are named `parent.child`
    pub fn new(name: &str) -> Self {
        Plugin {
            name: name.to_lowercase(),
            commands: HashMap::new(),
            events: HashMap::new(),
            help: HashMap::new(),
        }
    }

    /// Register a command handler under a tier
    pub fn command(mut self, tier: Tier, name: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.commands.insert((tier, name.to_lowercase()), handler);
        self
    }

    /// Register an event handler
    pub fn event(mut self, event: EventName, handler: Arc<dyn EventHandler>) -> Self {
        self.events.insert(event, handler);
        self
    }

    /// Add a help entry; `main` is shown when no command is named
    pub fn with_help(mut self, entry: &str, lines: &[&str]) -> Self {
        self.help.insert(
            entry.to_lowercase(),
            lines.iter().map(|line| line.to_string()).collect(),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_command(&self, name: &str, tier: Tier) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(&(tier, name.to_lowercase())).cloned()
    }

    pub fn get_event(&self, event: EventName) -> Option<Arc<dyn EventHandler>> {
        self.events.get(&event).cloned()
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn help_entry(&self, entry: &str) -> Option<&[String]> {
        self.help.get(&entry.to_lowercase()).map(Vec::as_slice)
    }

    fn has_help(&self) -> bool {
        !self.help.is_empty()
    }
}

/// The loaded plugins, in registration order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<Plugin>>,
}

impl PluginRegistry {
    /// Load a plugin, replacing any loaded plugin of the same name
    pub fn register(&mut self, plugin: Plugin) {
        info!("[LOAD] {}", plugin.name());
        let plugin = Arc::new(plugin);

        match self.plugins.iter_mut().find(|loaded| loaded.name() == plugin.name()) {
            Some(loaded) => *loaded = plugin,
            None => self.plugins.push(plugin),
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins
            .iter()
            .any(|plugin| plugin.name().eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Plugin>, DispatchError> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| DispatchError::PluginNotLoaded(name.to_string()))
    }

    pub fn all(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// The help entry for a plugin or one of its commands
    ///
    /// Always answers; a human readable message is returned when no entry exists.
    pub fn help(&self, plugin: &str, command: Option<&str>) -> Reply {
        let plugin = match self.get(plugin) {
            Ok(loaded) if loaded.has_help() => loaded,
            _ => {
                return Reply::text(format!(
                    "Either no help entries for <strong>{}</strong> are available or the plugin does not exist",
                    plugin
                ));
            }
        };

        let lines = match command {
            Some(command) => plugin.help_entry(command),
            None => plugin.help_entry("main"),
        };

        match lines {
            Some([line]) => Reply::text(line.clone()),
            Some(lines) => Reply::Many(lines.iter().cloned().map(Reply::Text).collect()),
            None => Reply::text(format!(
                "Either no help entry is available for <strong>{}</strong> or the command does not exist",
                command.unwrap_or("main")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin() -> Plugin {
        Plugin::new("Datetime")
            .command(Tier::Public, "date", command_fn("Syntax: datetime date", |_| Ok(Reply::text("today"))))
            .command(Tier::Admin, "Reset", command_fn("", |_| Ok(Reply::None)))
            .with_help("main", &["Provides various date and time services.", "Available commands: date"])
            .with_help("date", &["Returns the current date."])
    }

    #[test]
    fn test_plugin_tables() {
        let plugin = plugin();

        assert_eq!(plugin.name(), "datetime");
        assert!(plugin.get_command("DATE", Tier::Public).is_some());
        assert!(plugin.get_command("date", Tier::User).is_none());
        assert!(plugin.get_command("reset", Tier::Admin).is_some());
        assert_eq!(
            plugin.get_command("date", Tier::Public).unwrap().help(),
            "Syntax: datetime date"
        );
        assert!(plugin.has_commands());
        assert!(!plugin.has_events());
        assert!(plugin.get_event(EventName::Join).is_none());
    }

    #[test]
    fn test_registry() {
        let mut registry = PluginRegistry::default();
        registry.register(plugin());
        registry.register(Plugin::new("auth"));
        registry.register(Plugin::new("datetime"));

        // Re-registering keeps the original position
        assert_eq!(registry.names(), vec!["datetime", "auth"]);
        assert!(registry.is_loaded("AUTH"));
        assert!(!registry.get("datetime").unwrap().has_commands());

        assert!(matches!(
            registry.get("seen"),
            Err(DispatchError::PluginNotLoaded(_))
        ));
    }

    #[test]
    fn test_help() {
        let mut registry = PluginRegistry::default();
        registry.register(plugin());
        registry.register(Plugin::new("bare"));

        assert_eq!(
            registry.help("datetime", None),
            Reply::Many(vec![
                Reply::text("Provides various date and time services."),
                Reply::text("Available commands: date"),
            ])
        );
        assert_eq!(
            registry.help("datetime", Some("date")),
            Reply::text("Returns the current date.")
        );
        assert_eq!(
            registry.help("datetime", Some("time")),
            Reply::text(
                "Either no help entry is available for <strong>time</strong> or the command does not exist"
            )
        );
        assert_eq!(
            registry.help("bare", None),
            Reply::text(
                "Either no help entries for <strong>bare</strong> are available or the plugin does not exist"
            )
        );
        assert!(!registry.help("missing", Some("x")).is_empty());
    }
}
