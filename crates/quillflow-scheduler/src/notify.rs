//! Outbox: messages waiting for delivery plus a short delivery history.
//! Lightweight: an in-memory queue drained by the dispatcher loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use quillflow_core::message::Message;

/// History ring buffer size.
const HISTORY_LIMIT: usize = 100;

/// Keys remembered for in-process dedup. Older keys fall out; reminders
/// stay deduplicated through the reminder ledger.
const SEEN_LIMIT: usize = HISTORY_LIMIT * 10;

/// Delivery state of an outbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed(String),
    /// Replaced by a later message before it went out.
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub message: Message,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

/// Notification router. Queues messages and remembers what happened to them.
pub struct NotifyRouter {
    outbox: VecDeque<Notification>,
    /// Recently enqueued keys, oldest first in `seen_order`.
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    /// Delivery history (in-memory ring buffer, max 100).
    history: VecDeque<Notification>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self {
            outbox: VecDeque::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            history: VecDeque::new(),
        }
    }

    /// Queue a message. Returns false when its key was already queued.
    ///
    /// A message naming an undelivered key in `supersedes` pulls that entry
    /// out of the outbox and into history as `Superseded`.
    pub fn enqueue(&mut self, message: Message) -> bool {
        if !self.remember(&message.key) {
            tracing::debug!("📭 Skipping duplicate notice {}", message.key);
            return false;
        }
        if let Some(old) = &message.supersedes {
            if let Some(pos) = self.outbox.iter().position(|n| &n.message.key == old) {
                if let Some(mut replaced) = self.outbox.remove(pos) {
                    tracing::debug!("📭 {} supersedes undelivered {}", message.key, old);
                    replaced.status = DeliveryStatus::Superseded;
                    replaced.updated_at = message.created_at;
                    self.record(replaced);
                }
            }
        }
        let updated_at = message.created_at;
        self.outbox.push_back(Notification {
            message,
            status: DeliveryStatus::Pending,
            attempts: 0,
            updated_at,
        });
        true
    }

    fn remember(&mut self, key: &str) -> bool {
        if !self.seen.insert(key.to_string()) {
            return false;
        }
        self.seen_order.push_back(key.to_string());
        while self.seen_order.len() > SEEN_LIMIT {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    /// Queue every message, returning how many were new.
    pub fn enqueue_all(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for m in messages {
            if self.enqueue(m) {
                added += 1;
            }
        }
        added
    }

    /// Drain the outbox for delivery.
    pub fn take_pending(&mut self) -> Vec<Notification> {
        self.outbox.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }

    /// Record a delivered (or failed) notification in history.
    pub fn record(&mut self, notification: Notification) {
        self.history.push_back(notification);
        // Ring buffer, keep last 100
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Get notification history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Notification> {
        self.history.iter()
    }

    /// Pending and delivered messages, for inspection in tests and the CLI.
    pub fn messages(&self) -> Vec<&Message> {
        self.history
            .iter()
            .chain(self.outbox.iter())
            .filter(|n| n.status != DeliveryStatus::Superseded)
            .map(|n| &n.message)
            .collect()
    }
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new()
    }
}
