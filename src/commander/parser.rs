use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::errors::DispatchError;
use crate::plugins::PluginRegistry;

/// The marker that prefixes every command string unless configured otherwise
pub const DEFAULT_TRIGGER: &str = ">>>";

static SHORT_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-([a-zA-Z])$").expect("valid short option pattern"));
static LONG_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^--([a-zA-Z][\w-]*)="?(.+?)"?$"#).expect("valid long option pattern")
});
static SYNTAX_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Syntax: (.+)$").expect("valid syntax pattern"));
static OPTIONAL_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[<([^>]+)>\]").expect("valid optional argument pattern"));
static REQUIRED_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid required argument pattern"));

/// Recognizes command strings by their leading marker
#[derive(Debug, Clone)]
pub struct Trigger {
    marker: String,
    pattern: Regex,
}

impl Trigger {
    /// Create a trigger for the given marker
    ///
    /// A message is a command request when the marker is followed by an optional space
    /// and at least one letter.
    pub fn new(marker: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^{}( )?[a-zA-Z]+", regex::escape(marker)))?;
        Ok(Trigger {
            marker: marker.to_string(),
            pattern,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether the text is a command request
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Remove the marker and surrounding whitespace
    pub fn strip<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim_start();
        text.strip_prefix(self.marker.as_str()).unwrap_or(text).trim()
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::new(DEFAULT_TRIGGER).expect("default trigger is a valid pattern")
    }
}

/// The value of a command option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptValue {
    /// A `-x` style switch
    Toggle,
    /// A `--name=value` option
    Value(String),
}

impl OptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptValue::Toggle => None,
            OptValue::Value(value) => Some(value),
        }
    }
}

/// Command options keyed by their lower-cased name
pub type Options = HashMap<String, OptValue>;

/// The plugin and command a command string resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub plugin: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub help_requested: bool,
}

/// Usage information extracted from a handler's documentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Syntax {
    pub usage: Option<String>,
    pub required_args: usize,
}

/// Splits command strings into plugins, commands, arguments and options
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    trigger: Trigger,
    fold_option_values: bool,
}

impl CommandParser {
    /// Create a new parser
    ///
    /// # Arguments
    /// * `trigger` - The command trigger
    /// * `fold_option_values` - Lower-case the values of long options
    pub fn new(trigger: Trigger, fold_option_values: bool) -> Self {
        CommandParser {
            trigger,
            fold_option_values,
        }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Split a raw command string into positional arguments and options
    ///
    /// Tokens follow shell quoting rules. `-x` sets a toggle, `--name=value` sets a value;
    /// every other token is kept in order as an argument.
    pub fn parse_command_string(
        &self,
        command_string: &str,
    ) -> Result<(Vec<String>, Options), shell_words::ParseError> {
        let tokens = shell_words::split(self.trigger.strip(command_string))?;

        let mut args = Vec::new();
        let mut opts = Options::new();

        for token in tokens {
            if let Some(captures) = SHORT_OPTION.captures(&token) {
                debug!("Toggle option set: {}", token);
                opts.insert(captures[1].to_lowercase(), OptValue::Toggle);
                continue;
            }

            if let Some(captures) = LONG_OPTION.captures(&token) {
                let name = captures[1].to_lowercase();
                let value = if self.fold_option_values {
                    captures[2].to_lowercase()
                } else {
                    captures[2].to_string()
                };
                debug!("Value option set: {} ({})", name, value);
                opts.insert(name, OptValue::Value(value));
                continue;
            }

            args.push(token);
        }

        Ok((args, opts))
    }

    /// Resolve the plugin and command named by the leading arguments
    ///
    /// A leading `help` marks the request as a help lookup, as does a `help` in the command
    /// position. A loaded `parent.child` sub-plugin takes precedence over `parent`.
    pub fn parse_arguments(
        &self,
        mut args: Vec<String>,
        registry: &PluginRegistry,
    ) -> Result<ParsedCommand, DispatchError> {
        let mut help_requested = false;

        if args.first().is_some_and(|arg| arg.eq_ignore_ascii_case("help")) {
            debug!("Registering command string as a help request");
            args.remove(0);
            help_requested = true;
        }

        let plugin = match args.as_slice() {
            [first, second, ..] if registry.is_loaded(&sub_plugin(first, second)) => {
                let plugin = sub_plugin(first, second);
                args.drain(..2);
                plugin
            }
            [first, ..] if registry.is_loaded(&first.to_lowercase()) => {
                let plugin = first.to_lowercase();
                args.remove(0);
                plugin
            }
            _ => {
                debug!("Requested plugin is not loaded or does not exist");
                let name = args.first().cloned().unwrap_or_default();
                return Err(DispatchError::PluginNotLoaded(name));
            }
        };

        let mut command = pop_front(&mut args).map(|command| command.to_lowercase());
        if command.as_deref() == Some("help") {
            help_requested = true;
            command = pop_front(&mut args).map(|command| command.to_lowercase());
        }

        Ok(ParsedCommand {
            plugin,
            command,
            args,
            help_requested,
        })
    }

    /// Extract the usage line and required argument count from handler documentation
    ///
    /// Only the first `Syntax:` line counts. Placeholders wrapped in brackets are optional.
    pub fn parse_syntax(&self, doc: &str) -> Syntax {
        let Some(usage) = doc
            .lines()
            .find_map(|line| SYNTAX_LINE.captures(line.trim()))
            .map(|captures| captures[1].to_string())
        else {
            return Syntax::default();
        };

        let required = OPTIONAL_ARG.replace_all(&usage, "");
        let required_args = REQUIRED_ARG.find_iter(&required).count();
        debug!("Syntax matched: {} ({} required arguments)", usage, required_args);

        Syntax {
            usage: Some(usage),
            required_args,
        }
    }

    /// Rebuild a command string without its arguments so that it is safe to log
    ///
    /// # Returns
    /// The filtered string and whether anything was removed
    pub fn filter_command_string(&self, command_string: &str, registry: &PluginRegistry) -> (String, bool) {
        let marker = self.trigger.marker();
        let stripped = self.trigger.strip(command_string);

        let parsed = self
            .parse_command_string(command_string)
            .map_err(DispatchError::from)
            .and_then(|(args, _)| self.parse_arguments(args, registry));

        match parsed {
            Ok(parsed) if parsed.help_requested => (format!("{} {}", marker, stripped), false),
            Ok(parsed) => (
                format!(
                    "{} {} {}",
                    marker,
                    parsed.plugin,
                    parsed.command.unwrap_or_default()
                )
                .trim_end()
                .to_string(),
                !parsed.args.is_empty(),
            ),
            Err(DispatchError::PluginNotLoaded(_)) => {
                // Filter by position so typos in plugin names don't leak arguments
                let words = shell_words::split(stripped)
                    .unwrap_or_else(|_| stripped.split_whitespace().map(str::to_string).collect());
                let kept: Vec<&str> = words.iter().take(2).map(String::as_str).collect();
                (
                    format!("{} {}", marker, kept.join(" ")).trim_end().to_string(),
                    words.len() > 2,
                )
            }
            Err(DispatchError::Parse(_)) => (marker.to_string(), !stripped.is_empty()),
        }
    }
}

fn sub_plugin(parent: &str, child: &str) -> String {
    format!("{}.{}", parent, child).to_lowercase()
}

fn pop_front(args: &mut Vec<String>) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.remove(0))
    }
}
