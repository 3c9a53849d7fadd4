//! Outbound message handed to a notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::PaperId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Profile ids or emails.
    pub recipients: BTreeSet<String>,
    pub subject: String,
    pub body: String,
    pub reply_to: Option<String>,
    pub paper_id: Option<PaperId>,
    /// Stable key of the notice, e.g. `discussion_started:paper-1`.
    pub key: String,
    /// Key of an undelivered message this one replaces.
    pub supersedes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new<I, S>(key: impl Into<String>, recipients: I, subject: impl Into<String>, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: crate::types::generate_id("msg"),
            recipients: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            reply_to: None,
            paper_id: None,
            key: key.into(),
            supersedes: None,
            created_at: Utc::now(),
        }
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    pub fn for_paper(mut self, paper_id: &PaperId) -> Self {
        self.paper_id = Some(paper_id.clone());
        self
    }

    pub fn superseding(mut self, key: impl Into<String>) -> Self {
        self.supersedes = Some(key.into());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_for(&self, recipient: &str) -> bool {
        self.recipients.contains(recipient)
    }
}
