use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::destination;
use crate::commander::Command;
use crate::errors::CommandError;
use crate::networks::{EDITABLE_ATTRIBUTES, Network, NetworkEditError, NetworkList};
use crate::plugins::{Plugin, Tier, command_fn};
use crate::reply::Reply;

/// `admin network`: manage the saved network list
pub fn plugin(networks: Arc<NetworkList>) -> Plugin {
    let list = networks.clone();
    let show = networks.clone();
    let enable = networks.clone();
    let disable = networks.clone();
    let create = networks.clone();
    let edit = networks.clone();
    let remove = networks;

    Plugin::new("admin.network")
        .command(
            Tier::Admin,
            "list",
            command_fn("Lists all saved networks\nSyntax: admin network list", move |command| {
                list_networks(command, &list)
            }),
        )
        .command(
            Tier::Admin,
            "show",
            command_fn(
                "Displays detailed information about the specified network\nSyntax: admin network show <id>",
                move |command| show_network(command, &show),
            ),
        )
        .command(
            Tier::Admin,
            "enable",
            command_fn(
                "Enables the network's autojoin flag\nSyntax: admin network enable <id>",
                move |command| set_autojoin(command, &enable, true),
            ),
        )
        .command(
            Tier::Admin,
            "disable",
            command_fn(
                "Disables the network's autojoin flag\nSyntax: admin network disable <id>",
                move |command| set_autojoin(command, &disable, false),
            ),
        )
        .command(
            Tier::Admin,
            "create",
            command_fn(
                "Saves a new network\nSyntax: admin network create <name> <host> <port>",
                move |command| create_network(command, &create),
            ),
        )
        .command(
            Tier::Admin,
            "edit",
            command_fn(
                "Changes one attribute of a network\nSyntax: admin network edit <id> <attribute> <value>",
                move |command| edit_network(command, &edit),
            ),
        )
        .command(
            Tier::Admin,
            "remove",
            command_fn(
                "Removes a network from the list\nSyntax: admin network remove <id>",
                move |command| remove_network(command, &remove),
            ),
        )
        .with_help(
            "main",
            &[
                "Manages the IRC network list",
                "Available commands: <strong>list, show, enable, disable, create, edit, remove</strong>",
            ],
        )
        .with_help("list", &["Lists all saved networks", "Syntax: admin network list"])
        .with_help(
            "show",
            &[
                "Displays detailed information about the specified network.",
                "Syntax: admin network show <strong>&lt;id&gt;</strong>",
            ],
        )
        .with_help(
            "enable",
            &[
                "Enables the network's <strong>autojoin</strong> flag",
                "Syntax: admin network enable <strong>&lt;id&gt;</strong>",
            ],
        )
        .with_help(
            "disable",
            &[
                "Disables the network's <strong>autojoin</strong> flag",
                "Syntax: admin network disable <strong>&lt;id&gt;</strong>",
            ],
        )
        .with_help(
            "create",
            &[
                "Saves a new network. New networks are not joined until enabled.",
                "Syntax: admin network create <strong>&lt;name&gt; &lt;host&gt; &lt;port&gt;</strong>",
            ],
        )
        .with_help(
            "edit",
            &[
                "Changes one attribute of a network.",
                "Syntax: admin network edit <strong>&lt;id&gt; &lt;attribute&gt; &lt;value&gt;</strong>",
                "Attributes: <strong>name, host, port, nick, has_services, autojoin</strong>",
            ],
        )
        .with_help(
            "remove",
            &[
                "Removes a network from the list.",
                "Syntax: admin network remove <strong>&lt;id&gt;</strong>",
            ],
        )
}

fn network_id(command: &Command) -> Result<u64, CommandError> {
    command
        .arg(0)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| {
            CommandError::invalid_syntax(command)
                .with_message("Please specify a valid network ID")
                .with_destination(destination(command))
        })
}

fn status(network: &Network) -> &'static str {
    if network.autojoin {
        "green"
    } else {
        "red"
    }
}

fn list_networks(command: &Command, networks: &NetworkList) -> Result<Reply> {
    info!("Returning a list of networks to {}", command.source.nick);
    let networks = networks.all();

    if networks.is_empty() {
        return Ok(Reply::to(destination(command), "No networks found"));
    }

    let entries: Vec<String> = networks
        .iter()
        .map(|network| {
            format!(
                r#"<strong>{}:</strong> <p class="fg-{}">{}</p> ({}:{})"#,
                network.id,
                status(network),
                network.name,
                network.host,
                network.port
            )
        })
        .collect();

    Ok(Reply::to(destination(command), entries.join(" ")))
}

fn show_network(command: &Command, networks: &NetworkList) -> Result<Reply> {
    let id = network_id(command)?;
    let Some(network) = networks.get(id) else {
        return Ok(Reply::to(destination(command), "No network with the specified ID exists"));
    };

    let status = if network.autojoin {
        r#"<p class="fg-green">active</p>"#
    } else {
        r#"<p class="fg-red">disabled</p>"#
    };

    let mut details = vec![
        format!("<strong>Name:</strong> {}", network.name),
        format!("<strong>Status:</strong> {}", status),
        format!("<strong>Host:</strong> {}", network.host),
        format!("<strong>Port:</strong> {}", network.port),
        format!(
            "<strong>Has services:</strong> {}",
            if network.has_services { "Yes" } else { "No" }
        ),
    ];
    if let Some(nick) = &network.nick {
        details.push(format!("<strong>Nick:</strong> {}", nick));
    }

    info!("Returning network information to {}", command.source.nick);
    Ok(Reply::to(destination(command), details.join(" ")))
}

fn set_autojoin(command: &Command, networks: &NetworkList, autojoin: bool) -> Result<Reply> {
    let id = network_id(command)?;
    let Some(network) = networks.set_autojoin(id, autojoin) else {
        return Ok(Reply::to(destination(command), "No network with the specified ID exists"));
    };

    info!(
        "Network {} autojoin set to {} by {}",
        network.name, autojoin, command.source.nick
    );
    Ok(Reply::to(
        destination(command),
        format!(
            "Network <strong>{}</strong> successfully {}",
            network.name,
            if autojoin { "enabled" } else { "disabled" }
        ),
    ))
}

fn create_network(command: &Command, networks: &NetworkList) -> Result<Reply> {
    if command.args.len() > 3 {
        return Err(CommandError::too_many_arguments(command, Some(3))
            .with_destination(destination(command))
            .into());
    }

    let port: u16 = command.args[2].parse().map_err(|_| {
        CommandError::invalid_syntax(command)
            .with_message("Please specify a valid port number.")
            .with_destination(destination(command))
    })?;

    let network = networks.create(&command.args[0], &command.args[1], port);
    info!(
        "Network {} ({}:{}) created by {}",
        network.name, network.host, network.port, command.source.nick
    );
    Ok(Reply::to(
        destination(command),
        format!(
            "Network <strong>{}</strong> successfully created (<strong>{}:{}</strong>)",
            network.name, network.host, network.port
        ),
    ))
}

fn edit_network(command: &Command, networks: &NetworkList) -> Result<Reply> {
    let id = network_id(command)?;
    let attribute = command.args[1].to_lowercase();
    let value = command.args[2..].join(" ");

    // Report the name the network had before the edit
    let Some(before) = networks.get(id) else {
        return Ok(Reply::to(destination(command), "No network with the specified ID exists"));
    };

    let message = match networks.edit(id, &attribute, &value) {
        Ok(_) => {
            info!(
                "Network {} attribute {} set to {} by {}",
                before.name, attribute, value, command.source.nick
            );
            format!(
                "Attribute <strong>{}</strong> successfully updated to <strong>{}</strong> for network <strong>{}</strong>",
                attribute, value, before.name
            )
        }
        Err(NetworkEditError::InvalidAttribute(_)) => format!(
            "Invalid attribute, valid attributes include: <strong>{}</strong>",
            EDITABLE_ATTRIBUTES.join(", ")
        ),
        Err(NetworkEditError::InvalidValue { .. }) => {
            return Err(CommandError::invalid_syntax(command)
                .with_message(format!(
                    "<strong>{}</strong> is not a valid value for <strong>{}</strong>",
                    value, attribute
                ))
                .with_destination(destination(command))
                .into());
        }
        Err(NetworkEditError::NotFound(_)) => "No network with the specified ID exists".to_string(),
    };

    Ok(Reply::to(destination(command), message))
}

fn remove_network(command: &Command, networks: &NetworkList) -> Result<Reply> {
    let id = network_id(command)?;
    let Some(network) = networks.remove(id) else {
        return Ok(Reply::to(destination(command), "No network with the specified ID exists"));
    };

    info!("Network {} removed by {}", network.name, command.source.nick);
    Ok(Reply::to(
        destination(command),
        format!("Network <strong>{}</strong> successfully removed", network.name),
    ))
}
