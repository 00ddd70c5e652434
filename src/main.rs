mod auth;
mod cli;
mod commander;
mod config;
mod connection;
mod errors;
mod ignore;
mod networks;
mod plugins;
mod postmaster;
mod protocol;
mod reply;
#[cfg(test)]
mod test_helpers;
mod validator;

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use auth::{AuthGate, UserDirectory};
use cli::{Cli, Commands};
use commander::{CommandParser, Commander, Trigger};
use config::Config;
use connection::Connection;
use ignore::IgnoreList;
use networks::NetworkList;
use plugins::PluginRegistry;
use plugins::greeter::VisitorLog;
use postmaster::Postmaster;

/// The main entry point for the application
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Some(Commands::Start { channel }) => {
            start_bot(&cli, channel.clone()).await?;
        }
        Some(Commands::GenEnv { path }) => {
            generate_env_file(path)?;
        }
        Some(Commands::HashPassword { password }) => {
            println!("{}", bcrypt::hash(password, bcrypt::DEFAULT_COST)?);
        }
        None => {
            // Default to start command if no subcommand is specified
            start_bot(&cli, None).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli, channel_override: Option<String>) -> Result<Config> {
    info!("Loading configuration");
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    if let Some(channel) = channel_override {
        config.channel = channel;
    }
    if let Some(trigger) = &cli.trigger {
        config.trigger = trigger.clone();
    }

    Ok(config)
}

/// Start the bot with the given configuration
async fn start_bot(cli: &Cli, channel_override: Option<String>) -> Result<()> {
    let config = load_config(cli, channel_override)?;

    info!("Starting nano_ircbot");
    info!("Joining channel: {}", config.channel);

    // Make sure data directory exists
    let data_dir = std::path::Path::new(&config.data_dir);
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)?;
    }

    let users = Arc::new(UserDirectory::load(config.users_path()).await?);
    let networks = Arc::new(NetworkList::load(config.networks_path(), config.network()).await?);
    let network = networks
        .find_by_host(&config.server)
        .unwrap_or_else(|| config.network());

    let ignore = Arc::new(IgnoreList::load(config.ignore_path()).await?);

    let visitors = Arc::new(VisitorLog::new(config.visitors_path()));
    visitors.load().await?;

    // Set up the plugin registry
    let mut registry = PluginRegistry::default();
    registry.register(plugins::auth::plugin());
    registry.register(plugins::admin::plugin());
    registry.register(plugins::admin::network::plugin(networks.clone()));
    registry.register(plugins::admin::ignore::plugin());
    registry.register(plugins::datetime::plugin());
    registry.register(plugins::info::plugin());
    if config.greeter_enabled {
        registry.register(plugins::greeter::plugin(visitors.clone()));
    }
    info!("Registered plugins: {}", registry.names().join(", "));

    let trigger = Trigger::new(&config.trigger)?;
    info!("Using command trigger: '{}'", trigger.marker());
    let commander = Commander::new(
        CommandParser::new(trigger, config.fold_option_values),
        config.handler_timeout,
    );

    let (client, transport) = protocol::connect(&config).await?;

    let connection = Arc::new(
        Connection::new(network, &config.channel, &config.nick, Arc::new(transport), commander)
            .with_plugins(registry)
            .with_auth(Arc::new(AuthGate::new(users)))
            .with_ignore_list(ignore)
            .with_postmaster(Postmaster::new(config.max_command_depth))
            .with_whois_timeout(config.whois_timeout),
    );

    // Keep the application running
    info!("Bot is now running. Press Ctrl+C to exit.");
    tokio::select! {
        result = protocol::run(client, connection) => {
            if let Err(e) = result {
                error!("Connection closed with an error: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
    }

    // Save known visitors before exiting
    info!("Saving known visitors...");
    visitors.save().await?;

    Ok(())
}

/// Generate a sample .env file
fn generate_env_file(path: &str) -> Result<()> {
    info!("Generating sample .env file at {}", path);

    let contents = r#"# The IRC server to connect to
IRC_SERVER=irc.rizon.net
# IRC_PORT=6667
# IRC_USE_TLS=false
# The bot's nick
IRC_NICK=Nano
# The channel to join
IRC_CHANNEL=#nano
# Optional: A display name for the network
# IRC_NETWORK=Rizon
# Optional: The marker that starts a command
# BOT_TRIGGER=>>>
# Optional: Data directory for users, networks, the ignore list and known visitors
# DATA_DIR=./data
# HANDLER_TIMEOUT_SECS=10
# WHOIS_TIMEOUT_SECS=15
# MAX_COMMAND_DEPTH=5
# FOLD_OPTION_VALUES=false
# GREETER_ENABLED=true
"#;

    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;

    info!("Sample .env file generated successfully!");

    Ok(())
}
