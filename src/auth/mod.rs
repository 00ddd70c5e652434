//! The authentication gate
//!
//! Sessions are kept in memory for the life of the process and keyed by the network and the
//! (case-folded) host of the client that logged in. A client whose host changes is logged
//! out implicitly.

mod users;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::validator::{ValidationError, validate_login};

pub use users::{User, UserDirectory, UserRecord, UserStore};

/// Authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("already authenticated")]
    AlreadyAuthenticated,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no user exists with the e-mail {0}")]
    UserDoesNotExist(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("password hash could not be verified: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    network_id: u64,
    host: String,
}

impl SessionKey {
    fn new(host: &str, network_id: u64) -> Self {
        SessionKey {
            network_id,
            host: host.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    user_id: u64,
    created_at: DateTime<Utc>,
}

/// Tracks who is logged in from where
pub struct AuthGate {
    sessions: DashMap<SessionKey, Session>,
    users: Arc<dyn UserStore>,
}

impl AuthGate {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        AuthGate {
            sessions: DashMap::new(),
            users,
        }
    }

    /// Whether a session exists for this host on this network
    pub fn is_authenticated(&self, host: &str, network_id: u64) -> bool {
        self.sessions.contains_key(&SessionKey::new(host, network_id))
    }

    /// The user logged in from this host
    pub fn current_user(&self, host: &str, network_id: u64) -> Result<User, AuthError> {
        let user_id = self
            .sessions
            .get(&SessionKey::new(host, network_id))
            .map(|session| session.user_id)
            .ok_or(AuthError::NotAuthenticated)?;

        self.users
            .find_by_id(user_id)
            .ok_or(AuthError::NotAuthenticated)
    }

    pub fn is_admin(&self, user: &User) -> bool {
        user.is_admin
    }

    /// Log a user in from `host`
    ///
    /// The input is validated before the user store is consulted. Only one session may
    /// exist per host and network. No lock is held while the password is verified; the
    /// session is inserted afterwards, and a login that completed in the meantime wins.
    ///
    /// # Returns
    /// The user the session was created for
    pub fn attempt(&self, email: &str, password: &str, host: &str, network_id: u64) -> Result<User, AuthError> {
        validate_login(email, password)?;

        let key = SessionKey::new(host, network_id);
        if self.sessions.contains_key(&key) {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let record = self
            .users
            .find_by_email(email)
            .ok_or_else(|| AuthError::UserDoesNotExist(email.to_string()))?;

        if !bcrypt::verify(password, &record.password)? {
            return Err(AuthError::InvalidPassword);
        }

        match self.sessions.entry(key) {
            Entry::Occupied(_) => Err(AuthError::AlreadyAuthenticated),
            Entry::Vacant(entry) => {
                entry.insert(Session {
                    user_id: record.user.id,
                    created_at: Utc::now(),
                });
                info!("Created a session for {} from {}", record.user.email, host);
                Ok(record.user)
            }
        }
    }

    /// End the session for this host
    pub fn logout(&self, host: &str, network_id: u64) -> Result<(), AuthError> {
        match self.sessions.remove(&SessionKey::new(host, network_id)) {
            Some((_, session)) => {
                debug!(
                    "Session for user {} ended after {}s",
                    session.user_id,
                    (Utc::now() - session.created_at).num_seconds()
                );
                Ok(())
            }
            None => Err(AuthError::NotAuthenticated),
        }
    }

    /// Drop any session for this host; does nothing if there is none
    pub fn destroy(&self, network_id: u64, host: &str) {
        if self
            .sessions
            .remove(&SessionKey::new(host, network_id))
            .is_some()
        {
            debug!("Destroyed the session for {}", host);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ADMIN_EMAIL, TEST_PASSWORD, USER_EMAIL, test_users};
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Holds lookups for one e-mail until the test lets them through
    struct GatedStore {
        inner: UserDirectory,
        gated_email: &'static str,
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl UserStore for GatedStore {
        fn find_by_email(&self, email: &str) -> Option<UserRecord> {
            if email.eq_ignore_ascii_case(self.gated_email) {
                let _ = self.entered.lock().unwrap().send(());
                let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(5));
            }
            self.inner.find_by_email(email)
        }

        fn find_by_id(&self, id: u64) -> Option<User> {
            self.inner.find_by_id(id)
        }
    }

    fn gated(inner: UserDirectory, gated_email: &'static str) -> (Arc<GatedStore>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(GatedStore {
            inner,
            gated_email,
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (store, entered_rx, release_tx)
    }

    #[test]
    fn test_login_and_logout() {
        let auth = AuthGate::new(Arc::new(test_users()));

        let user = auth.attempt(USER_EMAIL, TEST_PASSWORD, "Host.Example", 1).unwrap();
        assert_eq!(user.email, USER_EMAIL);
        assert!(auth.is_authenticated("host.example", 1));
        assert!(!auth.is_authenticated("host.example", 2));
        assert_eq!(auth.current_user("host.example", 1).unwrap(), user);
        assert!(!auth.is_admin(&user));

        assert!(matches!(
            auth.attempt(ADMIN_EMAIL, TEST_PASSWORD, "host.example", 1),
            Err(AuthError::AlreadyAuthenticated)
        ));

        auth.logout("host.example", 1).unwrap();
        assert!(matches!(auth.logout("host.example", 1), Err(AuthError::NotAuthenticated)));
        assert!(matches!(
            auth.current_user("host.example", 1),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_failed_attempts() {
        let auth = AuthGate::new(Arc::new(test_users()));

        assert!(matches!(
            auth.attempt(USER_EMAIL, "wrong password", "host", 1),
            Err(AuthError::InvalidPassword)
        ));
        assert!(matches!(
            auth.attempt("nobody@example.com", TEST_PASSWORD, "host", 1),
            Err(AuthError::UserDoesNotExist(_))
        ));
        assert!(matches!(
            auth.attempt("nobody", TEST_PASSWORD, "host", 1),
            Err(AuthError::Validation(_))
        ));
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let auth = AuthGate::new(Arc::new(test_users()));
        auth.attempt(ADMIN_EMAIL, TEST_PASSWORD, "host", 1).unwrap();

        auth.destroy(1, "HOST");
        auth.destroy(1, "host");
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn test_slow_login_does_not_block_other_hosts() {
        let slow_user = UserRecord {
            user: User {
                id: 7,
                email: "slow@example.com".to_string(),
                nick: "Shino".to_string(),
                is_admin: false,
            },
            password: bcrypt::hash(TEST_PASSWORD, 12).unwrap(),
        };
        let (store, entered, release) = gated(UserDirectory::from_records(vec![slow_user]), "slow@example.com");
        release.send(()).unwrap();
        let auth = Arc::new(AuthGate::new(store));

        let slow = {
            let auth = auth.clone();
            thread::spawn(move || auth.attempt("slow@example.com", TEST_PASSWORD, "slow.host", 1))
        };
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        // The cost-12 verify is running now; every other host must still answer at once
        let mut worst = Duration::ZERO;
        for i in 0..256 {
            let started = Instant::now();
            assert!(!auth.is_authenticated(&format!("other{}.host", i), 1));
            worst = worst.max(started.elapsed());
        }
        assert!(worst < Duration::from_millis(50), "lookup took {:?}", worst);

        assert_eq!(slow.join().unwrap().unwrap().id, 7);
        assert!(auth.is_authenticated("slow.host", 1));
    }

    #[test]
    fn test_concurrent_login_from_same_host() {
        let (store, entered, release) = gated(test_users(), ADMIN_EMAIL);
        let auth = Arc::new(AuthGate::new(store));

        let held = {
            let auth = auth.clone();
            thread::spawn(move || auth.attempt(ADMIN_EMAIL, TEST_PASSWORD, "shared.host", 1))
        };
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        // Another login from the same host completes while the first is still checking
        let user = auth.attempt(USER_EMAIL, TEST_PASSWORD, "shared.host", 1).unwrap();
        release.send(()).unwrap();

        assert!(matches!(held.join().unwrap(), Err(AuthError::AlreadyAuthenticated)));
        assert_eq!(auth.current_user("shared.host", 1).unwrap(), user);
        assert_eq!(auth.session_count(), 1);
    }
}
