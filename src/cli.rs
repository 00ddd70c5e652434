use clap::{Parser, Subcommand};

/// A plugin-driven IRC bot
#[derive(Parser, Debug)]
#[command(name = "nano_ircbot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A plugin-driven IRC bot", long_about = None)]
pub struct Cli {
    /// Sets a custom config (.env) file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// The command trigger for the bot (overrides config file)
    #[arg(short, long)]
    pub trigger: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the bot
    Start {
        /// Channel to join (overrides config file)
        #[arg(short, long)]
        channel: Option<String>,
    },

    /// Generate a sample .env file
    GenEnv {
        /// Path to output the sample .env file
        #[arg(default_value = ".env.example")]
        path: String,
    },

    /// Print a bcrypt hash of a password, for users.json
    HashPassword {
        /// The password to hash
        password: String,
    },
}
