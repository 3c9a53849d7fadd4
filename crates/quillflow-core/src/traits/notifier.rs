//! Notifier trait: hands a message to a delivery channel.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Result;
use crate::locks::lock;
use crate::message::Message;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. Callers log failures and move on.
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Keeps every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Message> {
        lock(&self.sent).clone()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        lock(&self.sent).push(message.clone());
        Ok(())
    }
}
