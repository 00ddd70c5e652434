use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use irc::client::prelude::{
    Client, Command as IrcCommand, Config as IrcConfig, Message, Prefix, Response, Sender,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::{Connection, Transport, WhoisBroker};
use crate::protocol::event::{EventName, IrcEvent, NickMask, is_channel};

/// Outgoing half of an IRC connection
#[derive(Clone)]
pub struct IrcTransport {
    sender: Sender,
}

#[async_trait]
impl Transport for IrcTransport {
    async fn privmsg(&self, target: &str, message: &str) -> Result<()> {
        self.sender.send_privmsg(target, message)?;
        Ok(())
    }

    async fn notice(&self, target: &str, message: &str) -> Result<()> {
        self.sender.send_notice(target, message)?;
        Ok(())
    }

    async fn action(&self, target: &str, message: &str) -> Result<()> {
        self.sender.send_action(target, message)?;
        Ok(())
    }

    async fn whois(&self, targets: &str) -> Result<()> {
        self.sender
            .send(IrcCommand::WHOIS(None, targets.to_string()))?;
        Ok(())
    }
}

/// Connect to the configured server and register with it
///
/// # Arguments
/// * `config` - The bot configuration
///
/// # Returns
/// The connected client and its outgoing transport
pub async fn connect(config: &Config) -> Result<(Client, IrcTransport)> {
    info!(
        "Connecting to {}:{} as {}",
        config.server, config.port, config.nick
    );

    let irc_config = IrcConfig {
        nickname: Some(config.nick.clone()),
        server: Some(config.server.clone()),
        port: Some(config.port),
        use_tls: Some(config.use_tls),
        channels: vec![config.channel.clone()],
        ..IrcConfig::default()
    };

    let client = Client::from_config(irc_config).await?;
    client.identify()?;

    let transport = IrcTransport {
        sender: client.sender(),
    };

    Ok((client, transport))
}

/// Read messages from the server until the connection closes
///
/// Every translated event is dispatched on its own task. WHOIS numerics are fed to the
/// broker inline so that field lines always arrive before their terminator.
pub async fn run(mut client: Client, connection: Arc<Connection>) -> Result<()> {
    let mut stream = client.stream()?;

    while let Some(message) = stream.next().await.transpose()? {
        if feed_whois(&message, &connection.whois) {
            continue;
        }

        match translate(&message, client.current_nickname()) {
            Some(event) => {
                let connection = connection.clone();
                tokio::spawn(async move {
                    connection.handle_event(event).await;
                });
            }
            None => debug!("Ignoring message: {}", message.to_string().trim_end()),
        }
    }

    info!("Connection to the server closed");
    Ok(())
}

/// Translate a wire message into a dispatcher event
fn translate(message: &Message, own_nick: &str) -> Option<IrcEvent> {
    let source = match &message.prefix {
        Some(Prefix::Nickname(nick, user, host)) => NickMask::new(nick, user, host),
        _ => return None,
    };

    let event = match &message.command {
        IrcCommand::PRIVMSG(target, text) => {
            let public = is_public_target(target, own_nick);
            match ctcp_action(text) {
                Some(action) => IrcEvent::new(
                    EventName::action(public),
                    source,
                    target,
                    vec![action.to_string()],
                ),
                None => IrcEvent::new(
                    EventName::message(public),
                    source,
                    target,
                    vec![text.clone()],
                ),
            }
        }
        IrcCommand::NOTICE(target, text) => IrcEvent::new(
            EventName::notice(is_public_target(target, own_nick)),
            source,
            target,
            vec![text.clone()],
        ),
        IrcCommand::JOIN(channel, _, _) => IrcEvent::new(EventName::Join, source, channel, vec![]),
        IrcCommand::PART(channel, comment) => IrcEvent::new(
            EventName::Part,
            source,
            channel,
            comment.iter().cloned().collect(),
        ),
        IrcCommand::QUIT(comment) => IrcEvent::new(
            EventName::Quit,
            source,
            "",
            comment.iter().cloned().collect(),
        ),
        IrcCommand::KICK(channel, nick, comment) => {
            let mut arguments = vec![nick.clone()];
            arguments.extend(comment.iter().cloned());
            IrcEvent::new(EventName::Kick, source, channel, arguments)
        }
        _ => return None,
    };

    Some(event)
}

fn is_public_target(target: &str, own_nick: &str) -> bool {
    is_channel(target) && !target.eq_ignore_ascii_case(own_nick)
}

fn ctcp_action(text: &str) -> Option<&str> {
    text.strip_prefix("\u{1}ACTION ")
        .map(|action| action.trim_end_matches('\u{1}'))
}

/// Feed WHOIS numerics to the broker, returning true if the message was consumed
///
/// Field lists drop the leading recipient so they start with the queried nick.
fn feed_whois(message: &Message, broker: &WhoisBroker) -> bool {
    let IrcCommand::Response(response, args) = &message.command else {
        return false;
    };

    match (response, args.get(1)) {
        (Response::RPL_WHOISUSER, Some(nick)) => {
            broker.on_whois_user(nick, args[1..].to_vec());
            true
        }
        (Response::RPL_ENDOFWHOIS, Some(nick)) => {
            broker.on_end_of_whois(nick);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(line: &str) -> Message {
        line.parse::<Message>().unwrap()
    }

    #[test]
    fn test_translate_public_message() {
        let message = parse(":Mako!~mako@irc.example.net PRIVMSG #nano :>>> datetime date\r\n");
        let event = translate(&message, "nano").unwrap();

        assert_eq!(event.name, EventName::PublicMessage);
        assert_eq!(event.source.host, "irc.example.net");
        assert_eq!(event.target, "#nano");
        assert_eq!(event.text(), Some(">>> datetime date"));
    }

    #[test]
    fn test_translate_private_action() {
        let message = parse(":Mako!~mako@irc.example.net PRIVMSG nano :\u{1}ACTION waves\u{1}\r\n");
        let event = translate(&message, "nano").unwrap();

        assert_eq!(event.name, EventName::PrivateAction);
        assert_eq!(event.text(), Some("waves"));
    }

    #[test]
    fn test_translate_membership_events() {
        let join = translate(&parse(":Mako!~mako@host JOIN #nano\r\n"), "nano").unwrap();
        assert_eq!(join.name, EventName::Join);
        assert_eq!(join.target, "#nano");
        assert!(join.text().is_none());

        let kick = translate(&parse(":op!~op@host KICK #nano Mako :bye\r\n"), "nano").unwrap();
        assert_eq!(kick.name, EventName::Kick);
        assert_eq!(kick.arguments, vec!["Mako".to_string(), "bye".to_string()]);

        // Server messages have no nick mask
        assert!(translate(&parse(":irc.example.net NOTICE * :hello\r\n"), "nano").is_none());
    }

    #[tokio::test]
    async fn test_feed_whois() {
        let broker = WhoisBroker::new(Duration::from_secs(1));
        let receiver = broker.subscribe("Mako").receiver;

        assert!(feed_whois(
            &parse(":irc.example.net 311 nano Mako ~mako irc.example.net * :Makoto\r\n"),
            &broker
        ));
        assert!(feed_whois(
            &parse(":irc.example.net 318 nano Mako :End of /WHOIS list.\r\n"),
            &broker
        ));
        assert!(!feed_whois(&parse(":Mako!~mako@host JOIN #nano\r\n"), &broker));

        let fields = receiver.await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0][0], "Mako");
        assert_eq!(fields[0][2], "irc.example.net");
    }
}
