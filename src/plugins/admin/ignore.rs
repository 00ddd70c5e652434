use anyhow::Result;
use tracing::info;

use super::destination;
use crate::commander::Command;
use crate::connection::WhoisFields;
use crate::errors::CommandError;
use crate::ignore::IgnoreMask;
use crate::plugins::{Plugin, Tier, command_fn};
use crate::protocol::NickMask;
use crate::reply::Reply;

/// `admin ignore`: manage the connection's ignore list
pub fn plugin() -> Plugin {
    Plugin::new("admin.ignore")
        .command(
            Tier::Admin,
            "list",
            command_fn("Lists the ignore list entries\nSyntax: admin ignore list", list_entries),
        )
        .command(
            Tier::Admin,
            "add",
            command_fn(
                "Ignores a user by host, looked up from their nick\nSyntax: admin ignore add <nick>",
                add_entry,
            ),
        )
        .command(
            Tier::Admin,
            "delete",
            command_fn(
                "Removes an ignore list entry\nSyntax: admin ignore delete <id>",
                delete_entry,
            ),
        )
        .command(
            Tier::Admin,
            "clear",
            command_fn("Removes every ignore list entry\nSyntax: admin ignore clear", clear_entries),
        )
        .with_help(
            "main",
            &[
                "Manages the client ignore list.",
                "Available commands: <strong>list, add, delete, clear</strong>",
            ],
        )
        .with_help("list", &["Lists the ignore list entries", "Syntax: admin ignore list"])
        .with_help(
            "add",
            &[
                "Ignores a user by host. Give a nick to look the host up, or a full nick!user@host mask.",
                "Syntax: admin ignore add <strong>&lt;nick&gt;</strong>",
            ],
        )
        .with_help(
            "delete",
            &[
                "Removes an ignore list entry. See the list command for entry IDs.",
                "Syntax: admin ignore delete <strong>&lt;id&gt;</strong>",
            ],
        )
        .with_help("clear", &["Removes every ignore list entry", "Syntax: admin ignore clear"])
}

fn list_entries(command: &Command) -> Result<Reply> {
    let entries = command.connection().ignore.all();
    if entries.is_empty() {
        return Ok(Reply::to(
            destination(command),
            "There are no entries in the ignore list",
        ));
    }

    let entries: Vec<String> = entries
        .iter()
        .map(|entry| format!("<strong>{}:</strong> {} ({})", entry.id, entry.source, entry.mask))
        .collect();

    info!("Returning the ignore list to {}", command.source.nick);
    Ok(Reply::to(destination(command), entries.join(" ")))
}

fn add_entry(command: &Command) -> Result<Reply> {
    let Some(target) = command.arg(0) else {
        return Err(CommandError::not_enough_arguments(command, Some(1)).into());
    };

    // A full mask needs no lookup
    if target.contains('!') && target.contains('@') {
        let mask = NickMask::parse(target);
        if is_self(command, &mask.nick) || mask.host.eq_ignore_ascii_case(&command.source.host) {
            return Ok(refuse_self(command));
        }
        return ignore_host(command, &mask.nick, &mask.host);
    }

    if is_self(command, target) {
        return Ok(refuse_self(command));
    }

    let nick = target.to_string();
    let reply = Reply::to(
        destination(command),
        format!("Looking up <strong>{}</strong>, one moment", nick),
    );
    command.bind_whois(target, move |command, fields| ignore_whois_host(command, &nick, &fields));
    Ok(reply)
}

fn is_self(command: &Command, nick: &str) -> bool {
    nick.eq_ignore_ascii_case(&command.source.nick)
}

fn refuse_self(command: &Command) -> Reply {
    Reply::to(
        destination(command),
        "You can't add yourself to the ignore list! Why would you try and do that?",
    )
}

fn ignore_whois_host(command: &Command, nick: &str, fields: &WhoisFields) -> Result<Reply> {
    match fields.first().and_then(|user| user.get(2)) {
        Some(host) => ignore_host(command, nick, host),
        None => Ok(Reply::to(
            destination(command),
            format!("No user with the nick {} appears to be connected", nick),
        )),
    }
}

fn ignore_host(command: &Command, nick: &str, host: &str) -> Result<Reply> {
    let message = match command.connection().ignore.add(host, IgnoreMask::Host) {
        Ok(_) => {
            info!("{} ({}) added to the ignore list by {}", nick, host, command.source.nick);
            format!("{} ({}) successfully added to the ignore list", nick, host)
        }
        Err(_) => format!("{} ({}) is already on the ignore list", nick, host),
    };

    Ok(Reply::to(destination(command), message))
}

fn delete_entry(command: &Command) -> Result<Reply> {
    let id: u64 = command.arg(0).and_then(|id| id.parse().ok()).ok_or_else(|| {
        CommandError::invalid_syntax(command)
            .with_message("Please specify a valid ignore list ID entry (See the list command)")
            .with_destination(destination(command))
    })?;

    let message = match command.connection().ignore.delete_by_id(id) {
        Some(entry) => {
            info!("Ignore list entry {} ({}) removed by {}", id, entry.source, command.source.nick);
            "Ignore list entry successfully removed"
        }
        None => "No such ignore list entry exists",
    };

    Ok(Reply::to(destination(command), message))
}

fn clear_entries(command: &Command) -> Result<Reply> {
    if !command.args.is_empty() {
        return Err(CommandError::too_many_arguments(command, None)
            .with_destination(destination(command))
            .into());
    }

    command.connection().ignore.clear();
    info!("Ignore list cleared by {}", command.source.nick);
    Ok(Reply::to(destination(command), "Ignore list cleared successfully"))
}
