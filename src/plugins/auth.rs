use anyhow::Result;
use tracing::{debug, info};

use crate::auth::AuthError;
use crate::commander::Command;
use crate::errors::CommandError;
use crate::plugins::{Plugin, Tier, command_fn, event_fn};
use crate::protocol::EventName;
use crate::reply::{Destination, Reply};

const LOGIN_DOC: &str = "Log in to an existing account
Syntax: auth login <email> <password>";

/// Login, logout and whoami, all refused in public channels
pub fn plugin() -> Plugin {
    Plugin::new("auth")
        .command(Tier::Public, "login", command_fn(LOGIN_DOC, login))
        .command(Tier::Public, "logout", command_fn("Syntax: auth logout", logout))
        .command(Tier::Public, "whoami", command_fn("Syntax: auth whoami", whoami))
        .event(
            EventName::Quit,
            event_fn(|event, connection| {
                debug!("[QUIT] Destroying any active auth sessions for {}", event.source.nick);
                connection.auth.destroy(connection.network.id, &event.source.host);
                Ok(Reply::None)
            }),
        )
        .with_help(
            "main",
            &[
                "Provides user authentication services.",
                "Available commands: <strong>login, logout, whoami</strong>",
            ],
        )
        .with_help(
            "login",
            &[
                "Log in to an existing account. This command can not be used in public channels.",
                "Syntax: auth login <strong>&lt;email&gt;</strong> <strong>&lt;password&gt;</strong>",
            ],
        )
        .with_help(
            "logout",
            &["Destroy your current login session. This command can not be used in public channels."],
        )
        .with_help(
            "whoami",
            &["Returns the email of the account you are currently logged into. This command can not be used in public channels."],
        )
}

fn refuse_public(command: &Command) -> Reply {
    Reply::text(format!(
        "{}, you can't run this command in public channels, please send me a query!",
        command.source.nick
    ))
}

fn login(command: &Command) -> Result<Reply> {
    if command.public {
        info!("Refusing to run private command LOGIN in a public channel");
        return Ok(refuse_public(command));
    }

    let (Some(email), Some(password)) = (command.arg(0), command.arg(1)) else {
        return Err(CommandError::not_enough_arguments(command, Some(2)).into());
    };
    let connection = command.connection();

    info!("Attempting to authenticate {}", command.source.nick);
    match connection
        .auth
        .attempt(email, password, &command.source.host, connection.network.id)
    {
        Ok(user) => {
            info!("{} successfully authenticated as {}", command.source.nick, user.email);
            Ok(Reply::to(
                Destination::PrivateNotice,
                format!("You have successfully logged in as <strong>{}</strong>", user.email),
            ))
        }
        Err(AuthError::AlreadyAuthenticated) => {
            let user = connection
                .auth
                .current_user(&command.source.host, connection.network.id)?;
            Ok(Reply::text(format!("You are already logged in as {}!", user.email)))
        }
        Err(AuthError::Validation(e)) => Err(e.into()),
        Err(AuthError::UserDoesNotExist(_)) | Err(AuthError::InvalidPassword) => {
            info!("{} attempted to login using an invalid email/password combination", command.source.nick);
            Ok(Reply::text(
                "Either no account under this email exists or you supplied an incorrect password, please double check your login credentials and try again",
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn logout(command: &Command) -> Result<Reply> {
    if command.public {
        return Ok(refuse_public(command));
    }

    let connection = command.connection();
    match connection.auth.logout(&command.source.host, connection.network.id) {
        Ok(()) => {
            info!("{} successfully logged out", command.source.nick);
            Ok(Reply::text("You have been successfully logged out"))
        }
        Err(_) => Ok(Reply::text("You are not logged in")),
    }
}

fn whoami(command: &Command) -> Result<Reply> {
    if command.public {
        return Ok(refuse_public(command));
    }

    let connection = command.connection();
    match connection.auth.current_user(&command.source.host, connection.network.id) {
        Ok(user) => Ok(Reply::text(format!(
            "You are logged in as <strong>{}</strong>",
            user.email
        ))),
        Err(_) => Ok(Reply::text("You are not logged in")),
    }
}
