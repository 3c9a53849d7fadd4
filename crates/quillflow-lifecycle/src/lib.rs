//! # Quillflow Lifecycle
//!
//! The per-paper state machine. Everything here is pure: a transition takes
//! the current paper, the actor and the time, and either returns the next
//! paper or fails without touching anything.
//!
//! ```text
//! Submitted ──approve──▶ UnderReview ──decide──▶ DecisionPending ──approve──▶ Accepted ──▶ Retracted
//!     │                      │                        │                         (retraction + approval)
//!     ├─desk reject+approval─▶ DeskRejected           └─approve reject──▶ Rejected
//!     └─withdraw──────────────┴──────────────▶ Withdrawn
//! ```

pub mod citation;
pub mod decision;
pub mod replay;
pub mod transition;
pub mod visibility;

pub use decision::validate_decision;
pub use replay::{replay, same_lifecycle};
pub use transition::{
    Outcome, REPLY_CAP, ReviewVerdict, Transition, apply, is_assigned_editor, is_editor_in_chief,
    submit,
};
