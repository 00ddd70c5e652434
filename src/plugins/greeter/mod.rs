//! Welcomes first-time visitors when they join the channel

mod visitors;

use anyhow::Result;
use rand::prelude::IndexedRandom;
use rand::rng;
use std::sync::Arc;
use tracing::info;

use crate::connection::Connection;
use crate::plugins::{EventHandler, Plugin, Tier, command_fn};
use crate::protocol::{EventName, IrcEvent};
use crate::reply::{Destination, Reply};

pub use visitors::VisitorLog;

const DEFAULT_TEMPLATES: &[&str] = &[
    "Hi {nick}, I don't think we've met. I'm a bot; try \"help\" if you want to see what I can do.",
    "{nick}, first time on this channel? Pull up a chair.",
    "Oh, a new face. Hello {nick}!",
    "Hey {nick}. I'll remember you next time, promise.",
    "*waves at {nick}* Nice to meet you!",
];

/// Greets nicks the visitor log has never seen
pub struct Greeter {
    visitors: Arc<VisitorLog>,
    templates: Vec<String>,
}

impl Greeter {
    /// Create a greeter; `None` uses the built-in welcome templates
    pub fn new(visitors: Arc<VisitorLog>, templates: Option<Vec<String>>) -> Self {
        Greeter {
            visitors,
            templates: templates.unwrap_or_else(|| {
                DEFAULT_TEMPLATES.iter().map(|template| template.to_string()).collect()
            }),
        }
    }

    /// A random welcome for `nick`
    fn welcome(&self, nick: &str) -> String {
        let template = self
            .templates
            .choose(&mut rng())
            .map(String::as_str)
            .unwrap_or("Welcome, {nick}!");

        template.replace("{nick}", nick)
    }
}

impl EventHandler for Greeter {
    fn handle(&self, event: &IrcEvent, connection: &Arc<Connection>) -> Result<Reply> {
        let nick = &event.source.nick;
        if nick.eq_ignore_ascii_case(&connection.nickname) {
            return Ok(Reply::None);
        }

        if !self.visitors.is_first_visit(nick) {
            return Ok(Reply::None);
        }

        info!("First-time visitor detected: {} ({})", nick, event.source.host);
        Ok(Reply::to(Destination::Public, self.welcome(nick)))
    }
}

pub fn plugin(visitors: Arc<VisitorLog>) -> Plugin {
    let stats = visitors.clone();

    Plugin::new("greeter")
        .event(EventName::Join, Arc::new(Greeter::new(visitors, None)))
        .command(
            Tier::Public,
            "stats",
            command_fn("Syntax: greeter stats", move |_| {
                Ok(Reply::text(format!(
                    "I have met <strong>{}</strong> visitors so far",
                    stats.len()
                )))
            }),
        )
        .with_help(
            "main",
            &[
                "Welcomes people who join the channel for the first time.",
                "Available commands: <strong>stats</strong>",
            ],
        )
}
