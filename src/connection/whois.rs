use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// The `RPL_WHOISUSER` parameter lists collected for one WHOIS request
pub type WhoisFields = Vec<Vec<String>>;

#[derive(Default)]
struct PendingWhois {
    fields: WhoisFields,
    waiters: Vec<(u64, oneshot::Sender<WhoisFields>)>,
}

/// One subscriber's claim on the next WHOIS reply for a nick
pub struct WhoisSubscription {
    /// Identifies this subscriber when cancelling
    pub id: u64,
    pub receiver: oneshot::Receiver<WhoisFields>,
}

/// Correlates WHOIS replies from the server with the commands waiting on them
///
/// Requests are keyed by the (case-folded) nick they were sent for. Field lines are only
/// collected while somebody is subscribed. The entry is removed on the terminating
/// `RPL_ENDOFWHOIS`, or once its last subscriber has cancelled.
pub struct WhoisBroker {
    pending: DashMap<String, PendingWhois>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl WhoisBroker {
    pub fn new(timeout: Duration) -> Self {
        WhoisBroker {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// How long a subscriber should wait before giving up
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the next complete WHOIS reply for `nick`
    pub fn subscribe(&self, nick: &str) -> WhoisSubscription {
        let (sender, receiver) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending
            .entry(nick.to_lowercase())
            .or_default()
            .waiters
            .push((id, sender));
        WhoisSubscription { id, receiver }
    }

    /// Record an `RPL_WHOISUSER` line
    pub fn on_whois_user(&self, nick: &str, fields: Vec<String>) {
        match self.pending.get_mut(&nick.to_lowercase()) {
            Some(mut pending) => pending.fields.push(fields),
            None => debug!("Unsolicited WHOIS reply for {}", nick),
        }
    }

    /// Complete the request for `nick` and wake every subscriber
    pub fn on_end_of_whois(&self, nick: &str) {
        if let Some((_, pending)) = self.pending.remove(&nick.to_lowercase()) {
            for (_, waiter) in pending.waiters {
                // A dropped receiver only means the subscriber stopped waiting
                let _ = waiter.send(pending.fields.clone());
            }
        }
    }

    /// Drop one subscriber, returning whether it was still waiting
    ///
    /// Other subscribers for the same nick keep waiting; the request itself is only
    /// forgotten once nobody is left.
    pub fn cancel(&self, nick: &str, id: u64) -> bool {
        let key = nick.to_lowercase();

        let removed = match self.pending.get_mut(&key) {
            Some(mut pending) => {
                let before = pending.waiters.len();
                pending.waiters.retain(|(waiter_id, _)| *waiter_id != id);
                pending.waiters.len() != before
            }
            None => false,
        };

        self.pending.remove_if(&key, |_, pending| pending.waiters.is_empty());
        removed
    }

    /// Number of nicks still waiting on the server
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
