//! # Quillflow Assign
//!
//! Who works on which paper. Action editor and reviewer edges, the
//! pending-review and annual quotas, external invitations, review
//! solicitations and the anonymous groups that hide assignees.
//!
//! Every operation plans against the record store and returns a `Batch`
//! for the caller to commit under the paper lock.

pub mod anonymous;
pub mod assigner;
pub mod invite;
pub mod quota;
pub mod solicit;

#[cfg(test)]
mod testing;

pub use assigner::{AssignmentPlan, Assigner, EDGE_CAP, UnassignmentPlan};
pub use invite::{InviteOutcome, InvitePlan, InviteResponse, SignUpPlan};
pub use quota::{annual_assignments, check_quota, pending_reviews};
pub use solicit::{SolicitPlan, SolicitResponse};
