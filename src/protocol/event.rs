use std::fmt;

/// The identity of a client on the network (`nick!user@host`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NickMask {
    pub nick: String,
    pub user: String,
    pub host: String,
}

impl NickMask {
    /// Create a nick mask from its parts
    pub fn new<N, U, H>(nick: N, user: U, host: H) -> Self
    where
        N: Into<String>,
        U: Into<String>,
        H: Into<String>,
    {
        NickMask {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Parse a `nick!user@host` prefix; missing parts are left empty
    pub fn parse(mask: &str) -> Self {
        let (nick, rest) = mask.split_once('!').unwrap_or((mask, ""));
        let (user, host) = rest.split_once('@').unwrap_or((rest, ""));
        NickMask::new(nick, user, host)
    }
}

impl fmt::Display for NickMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}@{}", self.nick, self.user, self.host)
    }
}

/// Protocol events plugins can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Join,
    Part,
    Quit,
    Kick,
    PublicMessage,
    PrivateMessage,
    PublicAction,
    PrivateAction,
    PublicNotice,
    PrivateNotice,
}

impl EventName {
    /// The handler name plugins know this event by
    pub fn method_name(&self) -> &'static str {
        match self {
            EventName::Join => "on_join",
            EventName::Part => "on_part",
            EventName::Quit => "on_quit",
            EventName::Kick => "on_kick",
            EventName::PublicMessage => "on_public_message",
            EventName::PrivateMessage => "on_private_message",
            EventName::PublicAction => "on_public_action",
            EventName::PrivateAction => "on_private_action",
            EventName::PublicNotice => "on_public_notice",
            EventName::PrivateNotice => "on_private_notice",
        }
    }

    pub fn message(public: bool) -> Self {
        if public {
            EventName::PublicMessage
        } else {
            EventName::PrivateMessage
        }
    }

    pub fn action(public: bool) -> Self {
        if public {
            EventName::PublicAction
        } else {
            EventName::PrivateAction
        }
    }

    pub fn notice(public: bool) -> Self {
        if public {
            EventName::PublicNotice
        } else {
            EventName::PrivateNotice
        }
    }

    /// Whether the event came from a channel rather than a query
    pub fn is_public(&self) -> bool {
        !matches!(
            self,
            EventName::PrivateMessage | EventName::PrivateAction | EventName::PrivateNotice
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A protocol event delivered by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcEvent {
    pub name: EventName,
    pub source: NickMask,
    /// Channel or nick the event was addressed to
    pub target: String,
    /// Event parameters; the message text comes first for messages, actions and notices
    pub arguments: Vec<String>,
}

impl IrcEvent {
    pub fn new<T: Into<String>>(
        name: EventName,
        source: NickMask,
        target: T,
        arguments: Vec<String>,
    ) -> Self {
        IrcEvent {
            name,
            source,
            target: target.into(),
            arguments,
        }
    }

    /// The text of the event, if it carries any
    pub fn text(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }

    pub fn is_public(&self) -> bool {
        self.name.is_public()
    }
}

/// Whether a target names a channel rather than a nick
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
