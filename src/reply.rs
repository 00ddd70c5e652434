use std::fmt;

/// Where a reply should be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Query message to the caller
    Private,
    /// Notice to the caller
    PrivateNotice,
    /// Action in the caller's query
    PrivateAction,
    /// Message to the active channel
    Public,
    /// Notice to the active channel
    PublicNotice,
    /// Action in the active channel
    PublicAction,
    /// Action in whichever context the request came from
    Action,
    /// Not a wire destination: the message is a command string to execute
    Command,
}

impl Destination {
    /// Get the tag name of this destination
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Private => "private",
            Destination::PrivateNotice => "private_notice",
            Destination::PrivateAction => "private_action",
            Destination::Public => "public",
            Destination::PublicNotice => "public_notice",
            Destination::PublicAction => "public_action",
            Destination::Action => "action",
            Destination::Command => "command",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value returned by command and event handlers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reply {
    /// Nothing to say
    #[default]
    None,
    /// A message for the implicit destination (channel if public, query otherwise)
    Text(String),
    /// A message with an explicit destination
    Tagged(Destination, String),
    /// Several replies, delivered in order
    Many(Vec<Reply>),
}

impl Reply {
    /// Create an untagged reply
    pub fn text<S: Into<String>>(message: S) -> Self {
        Reply::Text(message.into())
    }

    /// Create a reply with an explicit destination
    pub fn to<S: Into<String>>(destination: Destination, message: S) -> Self {
        Reply::Tagged(destination, message.into())
    }

    /// The explicit destination of a single reply, if it has one
    pub fn destination(&self) -> Option<Destination> {
        match self {
            Reply::Tagged(destination, _) => Some(*destination),
            _ => None,
        }
    }

    /// The message carried by a single reply
    pub fn message(&self) -> Option<&str> {
        match self {
            Reply::Text(message) | Reply::Tagged(_, message) => Some(message),
            _ => None,
        }
    }

    /// Whether this reply carries at least one message
    pub fn is_empty(&self) -> bool {
        match self {
            Reply::None => true,
            Reply::Text(message) | Reply::Tagged(_, message) => message.is_empty(),
            Reply::Many(replies) => replies.iter().all(Reply::is_empty),
        }
    }

    /// Flatten into a list of single, non-empty replies, preserving order
    pub fn into_vec(self) -> Vec<Reply> {
        let mut flat = Vec::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(self, flat: &mut Vec<Reply>) {
        match self {
            Reply::Many(replies) => {
                for reply in replies {
                    reply.flatten_into(flat);
                }
            }
            reply if reply.is_empty() => {}
            reply => flat.push(reply),
        }
    }
}

impl From<&str> for Reply {
    fn from(message: &str) -> Self {
        Reply::text(message)
    }
}

impl From<String> for Reply {
    fn from(message: String) -> Self {
        Reply::Text(message)
    }
}

impl<S: Into<String>> From<(Destination, S)> for Reply {
    fn from((destination, message): (Destination, S)) -> Self {
        Reply::Tagged(destination, message.into())
    }
}

impl From<Vec<Reply>> for Reply {
    fn from(replies: Vec<Reply>) -> Self {
        Reply::Many(replies)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(reply: Option<T>) -> Self {
        reply.map_or(Reply::None, Into::into)
    }
}
