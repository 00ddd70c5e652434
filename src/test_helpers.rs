#![allow(dead_code)]
/// Test helpers for unit tests
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use crate::auth::{AuthGate, User, UserDirectory, UserRecord, UserStore};
use crate::commander::{Command, CommandParser, Commander, Options};
use crate::connection::{Connection, Transport};
use crate::networks::Network;
use crate::plugins::PluginRegistry;
use crate::protocol::NickMask;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "hunter22";

// Cost 4 is the bcrypt minimum; hashing once keeps the tests fast
static TEST_HASH: LazyLock<String> =
    LazyLock::new(|| bcrypt::hash(TEST_PASSWORD, 4).expect("hashing the test password"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Privmsg,
    Notice,
    Action,
}

/// A message that went out through the [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub kind: SentKind,
    pub target: String,
    pub message: String,
}

impl Sent {
    fn new(kind: SentKind, target: &str, message: &str) -> Self {
        Sent {
            kind,
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn privmsg(target: &str, message: &str) -> Self {
        Sent::new(SentKind::Privmsg, target, message)
    }

    pub fn notice(target: &str, message: &str) -> Self {
        Sent::new(SentKind::Notice, target, message)
    }

    pub fn action(target: &str, message: &str) -> Self {
        Sent::new(SentKind::Action, target, message)
    }
}

/// A transport that records everything instead of talking to a server
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    whois: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn whois_requests(&self) -> Vec<String> {
        self.whois.lock().unwrap().clone()
    }

    /// Make every send to `target` fail
    pub fn fail_for(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    fn record(&self, kind: SentKind, target: &str, message: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(target) {
            return Err(anyhow!("Failed to send to {}", target));
        }
        self.sent.lock().unwrap().push(Sent::new(kind, target, message));
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn privmsg(&self, target: &str, message: &str) -> Result<()> {
        self.record(SentKind::Privmsg, target, message)
    }

    async fn notice(&self, target: &str, message: &str) -> Result<()> {
        self.record(SentKind::Notice, target, message)
    }

    async fn action(&self, target: &str, message: &str) -> Result<()> {
        self.record(SentKind::Action, target, message)
    }

    async fn whois(&self, targets: &str) -> Result<()> {
        self.whois.lock().unwrap().push(targets.to_string());
        Ok(())
    }
}

/// A user store that counts how often it was asked for credentials
pub struct CountingStore {
    inner: UserDirectory,
    lookups: AtomicUsize,
}

impl CountingStore {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl UserStore for CountingStore {
    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email)
    }

    fn find_by_id(&self, id: u64) -> Option<User> {
        self.inner.find_by_id(id)
    }
}

/// An admin and a regular user, both with [`TEST_PASSWORD`]
pub fn test_users() -> UserDirectory {
    let record = |id, email: &str, nick: &str, is_admin| UserRecord {
        user: User {
            id,
            email: email.to_string(),
            nick: nick.to_string(),
            is_admin,
        },
        password: TEST_HASH.clone(),
    };

    UserDirectory::from_records(vec![
        record(1, ADMIN_EMAIL, "Mako", true),
        record(2, USER_EMAIL, "Kiba", false),
    ])
}

/// `nick!~nick@nick.example.net`, lower-cased where a server would
pub fn test_source(nick: &str) -> NickMask {
    let lower = nick.to_lowercase();
    NickMask::new(nick, format!("~{}", lower), format!("{}.example.net", lower))
}

fn build_connection(plugins: PluginRegistry, users: Arc<dyn UserStore>) -> (Arc<Connection>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let commander = Commander::new(CommandParser::default(), Duration::from_millis(100));

    let connection = Connection::new(
        Network::new(1, "Test", "irc.example.net", 6667),
        "#nano",
        "nano",
        transport.clone(),
        commander,
    )
    .with_plugins(plugins)
    .with_auth(Arc::new(AuthGate::new(users)))
    .with_whois_timeout(Duration::from_millis(50));

    (Arc::new(connection), transport)
}

/// A connection on `#nano` as `nano`, with [`test_users`] and short timeouts
pub fn test_connection(plugins: PluginRegistry) -> (Arc<Connection>, Arc<RecordingTransport>) {
    build_connection(plugins, Arc::new(test_users()))
}

/// Like [`test_connection`], also returning the user store to inspect lookups
pub fn test_connection_with_store(
    plugins: PluginRegistry,
) -> (Arc<Connection>, Arc<RecordingTransport>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore {
        inner: test_users(),
        lookups: AtomicUsize::new(0),
    });
    let (connection, transport) = build_connection(plugins, store.clone());
    (connection, transport, store)
}

/// A public command from Mako with the given arguments
pub fn test_command(connection: &Arc<Connection>, args: Vec<&str>) -> Command {
    Command::new(
        connection.clone(),
        args.into_iter().map(String::from).collect(),
        Options::new(),
        test_source("Mako"),
        true,
        None,
    )
}

/// Log `nick` in as `email` from the host [`test_source`] gives them
pub fn login(connection: &Connection, email: &str, nick: &str) -> User {
    connection
        .auth
        .attempt(email, TEST_PASSWORD, &test_source(nick).host, connection.network.id)
        .expect("test login")
}

/// Wait until at least `count` messages went out, failing after a second
pub async fn wait_for_sent(transport: &RecordingTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while transport.sent().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for sent messages");
}
