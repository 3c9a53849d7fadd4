//! Identity oracle: profiles and conflicts of interest.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileStatus {
    NoProfile,
    /// Signed up, not yet activated.
    Pending,
    Active,
}

pub trait IdentityOracle: Send + Sync {
    /// Whether `a` and `b` have a conflict of interest. Arguments may be
    /// profile ids or emails.
    fn has_conflict(&self, a: &str, b: &str) -> bool;

    fn profile_status(&self, email_or_id: &str) -> ProfileStatus;

    /// Profile id behind an email or id, when the profile is active.
    fn resolve(&self, email_or_id: &str) -> Option<String>;

    /// Address to deliver mail and replies to.
    fn preferred_email(&self, id: &str) -> Option<String>;
}
