//! External reviewer recruitment.
//!
//! `Invitation Sent → {Accepted, Declined}`. An acceptance from someone
//! without an active profile parks the edge in `Pending Sign Up`; once the
//! identity oracle reports the profile active, the assignment is created
//! and the invite edge removed.

use chrono::{DateTime, Utc};

use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::model::{AssignmentRole, Edge, EdgeKind, Edit, EditKind, Entity, InviteLabel};
use quillflow_core::traits::{Batch, ProfileStatus};
use quillflow_core::types::{Actor, EdgeId, PaperId};
use quillflow_lifecycle::REPLY_CAP;

use crate::assigner::{AssignmentPlan, Assigner};

#[derive(Debug, Clone)]
pub struct InvitePlan {
    pub batch: Batch,
    pub edge: Edge,
}

#[derive(Debug, Clone)]
pub enum InviteOutcome {
    Declined,
    /// Accepted by someone who has no active profile yet.
    PendingSignUp,
    Accepted(Box<AssignmentPlan>),
}

#[derive(Debug, Clone)]
pub struct InviteResponse {
    pub batch: Batch,
    pub edge: Edge,
    pub outcome: InviteOutcome,
}

/// Pending sign-up that became an assignment.
#[derive(Debug, Clone)]
pub struct SignUpPlan {
    pub batch: Batch,
    pub invite: Edge,
    pub assignment: AssignmentPlan,
}

fn open_label(label: Option<InviteLabel>) -> bool {
    matches!(
        label,
        Some(InviteLabel::InvitationSent) | Some(InviteLabel::PendingSignUp)
    )
}

impl Assigner<'_> {
    fn invite_edge(&self, paper_id: &PaperId, invitee: &str) -> Result<Option<Edge>> {
        let canonical = self.canonical(invitee);
        let lowered = invitee.to_lowercase();
        Ok(self.store.edges_for(paper_id)?.into_iter().find(|e| {
            e.is_invite()
                && e.is_active()
                && (e.tail == canonical || e.tail == lowered || e.tail == invitee)
        }))
    }

    /// Validate and plan `invite_external(paper, email_or_id, role)`.
    pub fn plan_invite(
        &self,
        paper_id: &PaperId,
        email_or_id: &str,
        role: AssignmentRole,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<InvitePlan> {
        let paper = self.store.paper(paper_id)?;
        self.authorize(&paper, role, actor)?;
        self.check_editable(&paper, role)?;

        let tail = match self.oracle.resolve(email_or_id) {
            Some(id) => id,
            None if email_or_id.contains('@') => email_or_id.to_lowercase(),
            None => email_or_id.to_string(),
        };
        let edges = self.store.edges_for(paper_id)?;
        if edges
            .iter()
            .any(|e| e.is_active() && e.is_assignment(role) && e.tail == tail)
        {
            return Err(QuillflowError::AlreadyMember(format!(
                "{tail} is already a {role} of paper {}",
                paper.number
            )));
        }
        if edges
            .iter()
            .any(|e| e.is_active() && e.kind == EdgeKind::Invite(role) && e.tail == tail && open_label(e.label))
        {
            return Err(QuillflowError::AlreadyInvited(format!(
                "{tail} was already invited to paper {}",
                paper.number
            )));
        }
        self.check_conflicts(&paper, &tail)?;

        let edge = Edge {
            id: EdgeId::generate(),
            paper_id: paper.id.clone(),
            tail,
            kind: EdgeKind::Invite(role),
            weight: 1,
            label: Some(InviteLabel::InvitationSent),
            created_by: actor.id.clone(),
            cdate: at,
            deletion_time: None,
            version: 0,
        };
        let mut batch = Batch::new();
        batch.put(Entity::Edge(edge.clone())).record(Edit::new(
            edge.id.as_str(),
            EditKind::Invitation,
            actor,
            serde_json::to_value(&edge)?,
            at,
        ));
        tracing::debug!("✉️ Planned {role} invitation of {} to paper {}", edge.tail, paper.number);
        Ok(InvitePlan { batch, edge })
    }

    /// Validate and plan the invitee's answer.
    pub fn plan_invite_response(
        &self,
        paper_id: &PaperId,
        invitee: &str,
        accept: bool,
        at: DateTime<Utc>,
    ) -> Result<InviteResponse> {
        let mut edge = self.invite_edge(paper_id, invitee)?.ok_or_else(|| {
            QuillflowError::NotInvitee(format!("{invitee} holds no invitation for paper {paper_id}"))
        })?;
        if edge.label != Some(InviteLabel::InvitationSent) {
            return Err(QuillflowError::invalid(REPLY_CAP));
        }
        let role = match edge.kind {
            EdgeKind::Invite(role) => role,
            EdgeKind::Assignment(_) => return Err(QuillflowError::invalid("not an invitation")),
        };
        let responder = Actor::new(self.canonical(invitee), role.role());
        let mut batch = Batch::new();

        let outcome = if !accept {
            edge.label = Some(InviteLabel::Declined);
            InviteOutcome::Declined
        } else if self.oracle.profile_status(&edge.tail) == ProfileStatus::Active {
            let paper = self.store.paper(paper_id)?;
            let plan = self.plan_assign_on_behalf(paper, &edge.tail, role, &responder, at)?;
            edge.label = Some(InviteLabel::Accepted);
            InviteOutcome::Accepted(Box::new(plan))
        } else {
            edge.label = Some(InviteLabel::PendingSignUp);
            InviteOutcome::PendingSignUp
        };

        batch.put(Entity::Edge(edge.clone())).record(Edit::new(
            edge.id.as_str(),
            EditKind::Invitation,
            &responder,
            serde_json::to_value(&edge)?,
            at,
        ));
        if let InviteOutcome::Accepted(plan) = &outcome {
            batch.extend(plan.batch.clone());
        }
        Ok(InviteResponse { batch, edge, outcome })
    }

    /// Invite edges of the paper waiting on a profile that is now active.
    pub fn ready_sign_ups(&self, paper_id: &PaperId) -> Result<Vec<Edge>> {
        Ok(self
            .store
            .edges_for(paper_id)?
            .into_iter()
            .filter(|e| {
                e.is_invite()
                    && e.is_active()
                    && e.label == Some(InviteLabel::PendingSignUp)
                    && self.oracle.profile_status(&e.tail) == ProfileStatus::Active
            })
            .collect())
    }

    /// Turn one pending sign-up into an assignment and remove the invite.
    pub fn plan_sign_up(&self, invite: &Edge, at: DateTime<Utc>) -> Result<SignUpPlan> {
        let role = match invite.kind {
            EdgeKind::Invite(role) => role,
            EdgeKind::Assignment(_) => return Err(QuillflowError::invalid("not an invitation")),
        };
        let person = self.canonical(&invite.tail);
        let actor = Actor::venue();
        let paper = self.store.paper(&invite.paper_id)?;
        let assignment = self.plan_assign_on_behalf(paper, &person, role, &actor, at)?;

        let mut removed = invite.clone();
        removed.label = Some(InviteLabel::Accepted);
        removed.deletion_time = Some(at);
        let mut batch = Batch::new();
        batch.put(Entity::Edge(removed.clone())).record(Edit::new(
            removed.id.as_str(),
            EditKind::Invitation,
            &actor,
            serde_json::to_value(&removed)?,
            at,
        ));
        batch.extend(assignment.batch.clone());
        Ok(SignUpPlan {
            batch,
            invite: removed,
            assignment,
        })
    }

    /// Close a pending sign-up that can no longer become an assignment.
    pub fn plan_close_sign_up(&self, invite: &Edge, at: DateTime<Utc>) -> Result<(Batch, Edge)> {
        let mut closed = invite.clone();
        closed.label = Some(InviteLabel::Declined);
        closed.deletion_time = Some(at);
        let mut batch = Batch::new();
        batch.put(Entity::Edge(closed.clone())).record(Edit::new(
            closed.id.as_str(),
            EditKind::Invitation,
            &Actor::venue(),
            serde_json::to_value(&closed)?,
            at,
        ));
        Ok((batch, closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, author, eic};
    use quillflow_core::traits::RecordStore;
    use quillflow_core::types::PaperState;

    #[test]
    fn test_invite_rejections() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();

        let plan = a
            .plan_invite(&paper.id, "New.Person@Example.org", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        assert_eq!(plan.edge.tail, "new.person@example.org");
        assert_eq!(plan.edge.label, Some(InviteLabel::InvitationSent));
        fx.store.commit(plan.batch).unwrap();

        let again = a
            .plan_invite(&paper.id, "new.person@example.org", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap_err();
        assert!(matches!(again, QuillflowError::AlreadyInvited(_)));

        let assigned = a
            .plan_assign(&paper.id, "~Rita_Reviewer1", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        fx.store.commit(assigned.batch).unwrap();
        let member = a
            .plan_invite(&paper.id, "rita@inst.org", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap_err();
        assert!(matches!(member, QuillflowError::AlreadyMember(_)));

        fx.directory.add_conflict("conflicted@uni.edu", "~Ada_Author1");
        let conflict = a
            .plan_invite(&paper.id, "conflicted@uni.edu", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap_err();
        assert!(matches!(conflict, QuillflowError::ConflictDetected(_)));

        let by_author = a
            .plan_invite(&paper.id, "x@y.org", AssignmentRole::Reviewer, &author(), fx.now)
            .unwrap_err();
        assert!(matches!(by_author, QuillflowError::NotInvitee(_)));
    }

    #[test]
    fn test_accept_with_active_profile_assigns() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let plan = a
            .plan_invite(&paper.id, "rita@inst.org", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        fx.store.commit(plan.batch).unwrap();

        let response = a.plan_invite_response(&paper.id, "rita@inst.org", true, fx.now).unwrap();
        assert_eq!(response.edge.label, Some(InviteLabel::Accepted));
        assert!(matches!(response.outcome, InviteOutcome::Accepted(_)));
        fx.store.commit(response.batch).unwrap();

        let active: Vec<_> = fx
            .store
            .edges_for(&paper.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer))
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].tail, "~Rita_Reviewer1");

        let twice = a.plan_invite_response(&paper.id, "rita@inst.org", false, fx.now).unwrap_err();
        assert!(twice.to_string().contains(REPLY_CAP));
    }

    #[test]
    fn test_pending_sign_up_becomes_assignment() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let plan = a
            .plan_invite(&paper.id, "newcomer@lab.org", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        fx.store.commit(plan.batch).unwrap();

        let response = a.plan_invite_response(&paper.id, "newcomer@lab.org", true, fx.now).unwrap();
        assert!(matches!(response.outcome, InviteOutcome::PendingSignUp));
        fx.store.commit(response.batch).unwrap();
        assert!(a.ready_sign_ups(&paper.id).unwrap().is_empty());

        fx.directory.add_pending_profile("~New_Comer1", "newcomer@lab.org");
        assert!(a.ready_sign_ups(&paper.id).unwrap().is_empty());
        fx.directory.activate("~New_Comer1");

        let ready = a.ready_sign_ups(&paper.id).unwrap();
        assert_eq!(ready.len(), 1);
        let signup = a.plan_sign_up(&ready[0], fx.now).unwrap();
        assert_eq!(signup.assignment.edge.tail, "~New_Comer1");
        fx.store.commit(signup.batch).unwrap();

        let edges = fx.store.edges_for(&paper.id).unwrap();
        assert!(edges.iter().all(|e| !(e.is_invite() && e.is_active())));
        assert!(edges
            .iter()
            .any(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer) && e.tail == "~New_Comer1"));
    }

    #[test]
    fn test_conflicted_sign_up_is_closed() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let plan = a
            .plan_invite(&paper.id, "gus@uni.edu", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        fx.store.commit(plan.batch).unwrap();
        let response = a.plan_invite_response(&paper.id, "gus@uni.edu", true, fx.now).unwrap();
        fx.store.commit(response.batch).unwrap();

        fx.directory.add_profile("~Gus_Guest1", "gus@uni.edu");
        fx.directory.add_conflict("~Gus_Guest1", "~Ada_Author1");
        let ready = a.ready_sign_ups(&paper.id).unwrap();
        assert_eq!(ready.len(), 1);
        let err = a.plan_sign_up(&ready[0], fx.now).unwrap_err();
        assert!(matches!(err, QuillflowError::ConflictDetected(_)));

        let (batch, closed) = a.plan_close_sign_up(&ready[0], fx.now).unwrap();
        assert_eq!(closed.label, Some(InviteLabel::Declined));
        fx.store.commit(batch).unwrap();
        assert!(a.ready_sign_ups(&paper.id).unwrap().is_empty());
        assert!(fx.store.edges_for(&paper.id).unwrap().iter().all(|e| !e.is_active()));
    }

    #[test]
    fn test_stranger_cannot_answer() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let err = fx
            .assigner()
            .plan_invite_response(&paper.id, "nobody@void.org", true, fx.now)
            .unwrap_err();
        assert!(matches!(err, QuillflowError::NotInvitee(_)));
    }
}
