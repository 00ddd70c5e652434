use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::commander::Command;
use crate::connection::WhoisFields;
use crate::plugins::{CommandHandler, Plugin, Tier, command_fn};
use crate::reply::{Destination, Reply};

/// Shows how long the bot has been running
pub struct UptimeCommand {
    started_at: Instant,
}

impl UptimeCommand {
    pub fn new() -> Self {
        UptimeCommand {
            started_at: Instant::now(),
        }
    }
}

impl Default for UptimeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for UptimeCommand {
    fn execute(&self, _command: &Command) -> Result<Reply> {
        let elapsed = self.started_at.elapsed().as_secs();

        let hours = elapsed / 3600;
        let minutes = (elapsed % 3600) / 60;
        let seconds = elapsed % 60;

        Ok(Reply::text(format!(
            "Bot has been running for {}h {}m {}s",
            hours, minutes, seconds
        )))
    }

    fn help(&self) -> &str {
        "Shows how long the bot has been running\nSyntax: info uptime"
    }
}

/// Small diagnostics: ping, uptime, whois and the `now` shortcut
pub fn plugin() -> Plugin {
    Plugin::new("info")
        .command(
            Tier::Public,
            "ping",
            command_fn("Responds with Pong!\nSyntax: info ping", |command| {
                Ok(Reply::text(format!("Pong! {}", command.source.nick)))
            }),
        )
        .command(Tier::Public, "uptime", Arc::new(UptimeCommand::new()))
        .command(
            Tier::Public,
            "whois",
            command_fn("Looks up who is behind a nick\nSyntax: info whois <nick>", whois),
        )
        .command(
            Tier::Public,
            "now",
            command_fn("Shows the current date and time\nSyntax: info now", |command| {
                let marker = command.connection().commander.trigger().marker().to_string();
                Ok(Reply::Many(vec![
                    Reply::to(Destination::Command, format!("{} datetime date", marker)),
                    Reply::to(Destination::Command, format!("{} datetime time", marker)),
                ]))
            }),
        )
        .with_help(
            "main",
            &[
                "Bot diagnostics.",
                "Available commands: <strong>ping, uptime, whois, now</strong>",
            ],
        )
        .with_help("whois", &["Syntax: info whois <strong>&lt;nick&gt;</strong>"])
}

fn whois(command: &Command) -> Result<Reply> {
    let Some(nick) = command.arg(0) else {
        return Ok(Reply::None);
    };

    debug!("{} requested a WHOIS for {}", command.source.nick, nick);
    let target = nick.to_string();
    command.bind_whois(nick, move |_, fields| Ok(describe(&target, &fields)));

    Ok(Reply::to(Destination::Action, format!("looks around for {}", nick)))
}

fn describe(nick: &str, fields: &WhoisFields) -> Reply {
    match fields.first().map(Vec::as_slice) {
        Some([found, user, host, _, real_name, ..]) => Reply::text(format!(
            "<strong>{}</strong> is {}@{} ({})",
            found, user, host, real_name
        )),
        Some([found, user, host, ..]) => {
            Reply::text(format!("<strong>{}</strong> is {}@{}", found, user, host))
        }
        _ => Reply::text(format!("I couldn't find anyone named <strong>{}</strong>", nick)),
    }
}
