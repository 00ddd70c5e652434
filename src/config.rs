use anyhow::{Context, Result, anyhow};
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::commander::parser::DEFAULT_TRIGGER;
use crate::networks::Network;
use crate::postmaster::DEFAULT_MAX_DEPTH;

/// Configuration for the IRC bot
#[derive(Debug, Clone)]
pub struct Config {
    /// The IRC server to connect to
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    /// The bot's nick
    pub nick: String,
    /// The channel to join on connect
    pub channel: String,
    /// A display name for the network
    pub network_name: String,
    /// The marker that starts a command, e.g. `>>>`
    pub trigger: String,
    /// The data directory for users, networks, the ignore list and known visitors
    pub data_dir: String,
    pub handler_timeout: Duration,
    pub whois_timeout: Duration,
    /// How deeply command replies may expand into further commands
    pub max_command_depth: usize,
    /// Lower-case option values as well as option names
    pub fold_option_values: bool,
    pub greeter_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Returns
    /// A Result containing the Config if successful, or an error if required variables are missing
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Config::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from a specific .env file, then the environment
    pub fn from_file(path: &str) -> Result<Self> {
        dotenv::from_path(path).with_context(|| format!("Failed to read config file {}", path))?;
        Config::from_vars(|name| env::var(name).ok())
    }

    /// Build a config from a variable lookup
    fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            var(name).ok_or_else(|| anyhow!("{} environment variable not set", name))
        };

        let server = required("IRC_SERVER")?;
        let nick = required("IRC_NICK")?;
        let channel = required("IRC_CHANNEL")?;

        Ok(Config {
            network_name: var("IRC_NETWORK").unwrap_or_else(|| server.clone()),
            port: parse_var(&var, "IRC_PORT", 6667)?,
            use_tls: parse_var(&var, "IRC_USE_TLS", false)?,
            trigger: var("BOT_TRIGGER").unwrap_or_else(|| DEFAULT_TRIGGER.to_string()),
            // Optional data directory, default to ./data
            data_dir: var("DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            handler_timeout: Duration::from_secs(parse_var(&var, "HANDLER_TIMEOUT_SECS", 10)?),
            whois_timeout: Duration::from_secs(parse_var(&var, "WHOIS_TIMEOUT_SECS", 15)?),
            max_command_depth: parse_var(&var, "MAX_COMMAND_DEPTH", DEFAULT_MAX_DEPTH)?,
            fold_option_values: parse_var(&var, "FOLD_OPTION_VALUES", false)?,
            greeter_enabled: parse_var(&var, "GREETER_ENABLED", true)?,
            server,
            nick,
            channel,
        })
    }

    /// The configured network, used when no network list has been saved
    pub fn network(&self) -> Network {
        let mut network = Network::new(1, &self.network_name, &self.server, self.port);
        network.nick = Some(self.nick.clone());
        network
    }

    pub fn users_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("users.json")
    }

    pub fn networks_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("networks.json")
    }

    pub fn ignore_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("ignore.json")
    }

    pub fn visitors_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("known_visitors.txt")
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, value)),
        None => Ok(default),
    }
}
