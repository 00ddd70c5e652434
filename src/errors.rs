use thiserror::Error;

use crate::commander::Command;
use crate::reply::{Destination, Reply};

const HELP_HINT: &str = "If you need help, please try running \"help <plugin> <command>\"";

/// The recoverable failures a command handler may report back to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    NotEnoughArguments,
    TooManyArguments,
    InvalidSyntax,
    PermissionDenied,
}

/// A command-level error carrying the message shown to the caller
///
/// Handlers return these through `anyhow::Error`; the commander recognizes them and turns
/// them into a reply instead of the generic failure message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub message: String,
    /// Explicit delivery destination, or `None` for the caller's context
    pub destination: Option<Destination>,
}

impl CommandError {
    /// Create a new command error with a custom message
    pub fn new<S: Into<String>>(kind: CommandErrorKind, message: S) -> Self {
        CommandError {
            kind,
            message: message.into(),
            destination: None,
        }
    }

    /// The caller did not supply enough positional arguments
    pub fn not_enough_arguments(command: &Command, min_args: Option<usize>) -> Self {
        let mut message = match min_args {
            Some(min_args) if min_args > 0 => format!(
                "This command requires at least <strong>{}</strong> arguments. ",
                min_args
            ),
            _ => "You did not provide enough arguments for this command. ".to_string(),
        };
        message.push_str(&syntax_hint(command));

        Self::new(CommandErrorKind::NotEnoughArguments, message)
    }

    /// The caller supplied more positional arguments than the command accepts
    pub fn too_many_arguments(command: &Command, max_args: Option<usize>) -> Self {
        let mut message = match max_args {
            Some(max_args) => format!(
                "This command can not have more than <strong>{}</strong> arguments. ",
                max_args
            ),
            None => "You provided too many arguments for this command. ".to_string(),
        };
        message.push_str(&syntax_hint(command));

        Self::new(CommandErrorKind::TooManyArguments, message)
    }

    /// An argument was present but malformed
    pub fn invalid_syntax(command: &Command) -> Self {
        let message = match &command.syntax {
            Some(syntax) => format!(
                "Invalid syntax. Please use the following command syntax: <strong>{}</strong>",
                syntax
            ),
            None => format!("Invalid syntax. {}", HELP_HINT),
        };

        Self::new(CommandErrorKind::InvalidSyntax, message)
    }

    /// The caller is not allowed to perform the requested action
    pub fn permission_denied() -> Self {
        Self::new(
            CommandErrorKind::PermissionDenied,
            "Access Denied. You do not have permission to perform the requested action.",
        )
    }

    /// Replace the default message
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    /// Deliver the error to an explicit destination
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Convert the error into the reply shown to the caller
    pub fn to_reply(&self) -> Reply {
        match self.destination {
            Some(destination) => Reply::to(destination, self.message.clone()),
            None => Reply::text(self.message.clone()),
        }
    }
}

fn syntax_hint(command: &Command) -> String {
    match &command.syntax {
        Some(syntax) => format!("Syntax: <strong>{}</strong>", syntax),
        None => HELP_HINT.to_string(),
    }
}

/// Failures while turning a command string into a plugin invocation
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("the requested plugin is not loaded or does not exist: {0}")]
    PluginNotLoaded(String),

    #[error("unable to parse the command string: {0}")]
    Parse(#[from] shell_words::ParseError),
}
