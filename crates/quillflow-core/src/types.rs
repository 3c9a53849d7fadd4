//! Identifiers, roles and paper states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable paper identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(pub String);

impl PaperId {
    pub fn generate() -> Self {
        Self(format!("paper-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Assignment / invite edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn generate() -> Self {
        Self(format!("edge-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Roles an actor can act under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EditorInChief,
    ActionEditor,
    Reviewer,
    Author,
    /// Venue support staff and automated processes.
    Venue,
}

impl Role {
    /// The role a late task escalates to.
    pub fn next_up(&self) -> Option<Role> {
        match self {
            Role::Reviewer | Role::Author => Some(Role::ActionEditor),
            Role::ActionEditor => Some(Role::EditorInChief),
            Role::EditorInChief | Role::Venue => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::EditorInChief => write!(f, "Editor-in-Chief"),
            Role::ActionEditor => write!(f, "Action Editor"),
            Role::Reviewer => write!(f, "Reviewer"),
            Role::Author => write!(f, "Author"),
            Role::Venue => write!(f, "Venue"),
        }
    }
}

/// Someone issuing an edit: a profile id (or email) plus the role claimed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn author(id: impl Into<String>) -> Self {
        Self::new(id, Role::Author)
    }

    pub fn action_editor(id: impl Into<String>) -> Self {
        Self::new(id, Role::ActionEditor)
    }

    pub fn reviewer(id: impl Into<String>) -> Self {
        Self::new(id, Role::Reviewer)
    }

    pub fn editor_in_chief(id: impl Into<String>) -> Self {
        Self::new(id, Role::EditorInChief)
    }

    pub fn venue() -> Self {
        Self::new("venue", Role::Venue)
    }
}

/// Canonical lifecycle state of a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperState {
    Submitted,
    UnderReview,
    DeskRejected,
    Rejected,
    Withdrawn,
    DecisionPending,
    Accepted,
    Retracted,
}

impl PaperState {
    /// Submitted, under review or awaiting decision approval.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PaperState::Submitted | PaperState::UnderReview | PaperState::DecisionPending
        )
    }

    /// Review is over, whatever the outcome.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Visible to everyone once reviewing has started.
    pub fn is_public(&self) -> bool {
        !matches!(self, PaperState::Submitted | PaperState::DeskRejected)
    }
}

impl fmt::Display for PaperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaperState::Submitted => "Submitted",
            PaperState::UnderReview => "Under Review",
            PaperState::DeskRejected => "Desk Rejected",
            PaperState::Rejected => "Rejected",
            PaperState::Withdrawn => "Withdrawn",
            PaperState::DecisionPending => "Decision Pending",
            PaperState::Accepted => "Accepted",
            PaperState::Retracted => "Retracted",
        };
        f.write_str(s)
    }
}
