//! Error taxonomy shared by every Quillflow crate.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, QuillflowError>;

#[derive(Debug, Error)]
pub enum QuillflowError {
    /// Wrong role, wrong current state, failed content rule or reply cap.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Duplicate assignment: {0}")]
    DuplicateAssignment(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Conflict detected: {0}")]
    ConflictDetected(String),

    #[error("Paper not editable: {0}")]
    PaperNotEditable(String),

    #[error("Already invited: {0}")]
    AlreadyInvited(String),

    #[error("Already member: {0}")]
    AlreadyMember(String),

    /// Actor is not allowed to perform this approval or edit.
    #[error("Not invitee: {0}")]
    NotInvitee(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuillflowError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether the error is one of the synchronous workflow rejections
    /// (as opposed to an infrastructure failure).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_)
                | Self::DuplicateAssignment(_)
                | Self::QuotaExceeded(_)
                | Self::ConflictDetected(_)
                | Self::PaperNotEditable(_)
                | Self::AlreadyInvited(_)
                | Self::AlreadyMember(_)
                | Self::NotInvitee(_)
        )
    }
}
