//! Reviewer recruitment: external invitations, pending sign-ups and
//! review solicitations.

use chrono::{DateTime, Utc};

use quillflow_assign::{InviteOutcome, SolicitResponse};
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::locks::lock;
use quillflow_core::model::{AssignmentRole, Edge, EdgeKind, Entity, InviteLabel, Note, NoteKind};
use quillflow_core::types::{Actor, PaperId};
use quillflow_scheduler::{EventKind, SweepReport};

use crate::engine::Engine;

impl Engine {
    /// Invite someone by email or profile id.
    pub fn invite_external(
        &self,
        paper_id: &PaperId,
        email_or_id: &str,
        role: AssignmentRole,
        actor: &Actor,
    ) -> Result<Edge> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();
        let plan = self.assigner().plan_invite(paper_id, email_or_id, role, actor, at)?;
        self.store.commit(plan.batch)?;
        tracing::info!("✉️ Invited {} as {} to paper {}", plan.edge.tail, role, paper_id);

        let paper = self.store.paper(paper_id)?;
        let kind = EventKind::Invited {
            role,
            invitee: plan.edge.tail.clone(),
        };
        self.announce(&paper, actor, at, vec![kind]);
        Ok(plan.edge)
    }

    /// The invitee's answer. Returns the invitation's new label.
    pub fn respond_to_invitation(&self, paper_id: &PaperId, invitee: &str, accept: bool) -> Result<InviteLabel> {
        let slot = self.paper_slot(paper_id);
        let _paper = lock(&slot);
        let assigner = self.assigner();
        let person = assigner.canonical(invitee);
        let reviewer_slot = self.reviewer_slot(&person);
        let _reviewer = lock(&reviewer_slot);

        let at = self.clock.now();
        let response = assigner.plan_invite_response(paper_id, invitee, accept, at)?;
        self.store.commit(response.batch)?;
        let label = response.edge.label.unwrap_or(InviteLabel::InvitationSent);
        tracing::info!("✉️ {} answered invitation to paper {}: {}", response.edge.tail, paper_id, label);

        let role = match response.edge.kind {
            EdgeKind::Invite(role) | EdgeKind::Assignment(role) => role,
        };
        let responder = Actor::new(person, role.role());
        let mut kinds = vec![EventKind::InvitationAnswered {
            invitee: response.edge.tail.clone(),
            label,
        }];
        let paper = match response.outcome {
            InviteOutcome::Accepted(plan) => {
                kinds.push(EventKind::Assigned {
                    role,
                    person: plan.edge.tail.clone(),
                    anon_id: plan.anon_group.id.clone(),
                });
                self.stored(plan.paper)
            }
            InviteOutcome::Declined | InviteOutcome::PendingSignUp => self.store.paper(paper_id)?,
        };
        self.announce(&paper, &responder, at, kinds);
        Ok(label)
    }

    /// Turn pending sign-ups whose profile is now active into assignments.
    /// Returns how many completed.
    pub fn process_pending_signups(&self) -> usize {
        self.complete_sign_ups(self.clock.now()).reminders
    }

    /// Sign-ups at `now`, reported in sweep terms: `reminders` counts
    /// completed sign-ups, failures are per paper.
    pub(crate) fn complete_sign_ups(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let papers = match self.store.papers() {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!("⚠️ Could not list papers for sign-ups: {e}");
                return report;
            }
        };
        for paper in papers.into_iter().filter(|p| p.state.is_active()) {
            match self.sign_ups_for(&paper.id, now) {
                Ok(done) => report.reminders += done,
                Err(e) => {
                    tracing::warn!("⚠️ Sign-up processing for paper {} failed: {e}", paper.number);
                    report.failures.push((paper.id.clone(), e.to_string()));
                }
            }
        }
        report
    }

    fn sign_ups_for(&self, paper_id: &PaperId, now: DateTime<Utc>) -> Result<usize> {
        let slot = self.paper_slot(paper_id);
        let _paper = lock(&slot);
        let assigner = self.assigner();
        let mut done = 0;
        // One at a time: each plan must see the previous assignment.
        for invite in assigner.ready_sign_ups(paper_id)? {
            let person = assigner.canonical(&invite.tail);
            let reviewer_slot = self.reviewer_slot(&person);
            let _reviewer = lock(&reviewer_slot);

            let plan = match assigner.plan_sign_up(&invite, now) {
                Ok(plan) => plan,
                Err(e @ (QuillflowError::ConflictDetected(_) | QuillflowError::PaperNotEditable(_))) => {
                    let (batch, closed) = assigner.plan_close_sign_up(&invite, now)?;
                    self.store.commit(batch)?;
                    tracing::warn!("🚫 Sign-up of {} closed on paper {}: {e}", person, paper_id);
                    let kind = EventKind::SignUpBlocked {
                        invitee: closed.tail,
                        person: person.clone(),
                        reason: e.to_string(),
                    };
                    let paper = self.store.paper(paper_id)?;
                    self.announce(&paper, &Actor::venue(), now, vec![kind]);
                    continue;
                }
                Err(QuillflowError::QuotaExceeded(reason)) => {
                    tracing::debug!("⏳ Sign-up of {} waits on quota: {reason}", person);
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.store.commit(plan.batch)?;
            tracing::info!("🆕 {} signed up and joined paper {}", person, plan.assignment.paper.number);

            let assignment = plan.assignment;
            let role = match invite.kind {
                EdgeKind::Invite(role) | EdgeKind::Assignment(role) => role,
            };
            let kinds = vec![
                EventKind::SignUpCompleted {
                    invitee: invite.tail.clone(),
                    person: assignment.edge.tail.clone(),
                },
                EventKind::Assigned {
                    role,
                    person: assignment.edge.tail.clone(),
                    anon_id: assignment.anon_group.id.clone(),
                },
            ];
            let paper = self.stored(assignment.paper);
            self.announce(&paper, &Actor::venue(), now, kinds);
            done += 1;
        }
        Ok(done)
    }

    /// A reviewer volunteers to review the paper.
    pub fn solicit_review(&self, paper_id: &PaperId, reviewer: &Actor, comment: &str) -> Result<Note> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();
        let plan = self.assigner().plan_solicit(paper_id, reviewer, comment, at)?;
        self.store.commit(plan.batch)?;
        tracing::info!("🙋 {} solicited to review paper {}", plan.note.signature, paper_id);

        let paper = self.store.paper(paper_id)?;
        let kind = EventKind::SolicitationPosted {
            person: plan.note.signature.clone(),
        };
        self.announce(&paper, reviewer, at, vec![kind]);
        Ok(plan.note)
    }

    /// The action editor approves or declines a solicitation.
    pub fn respond_to_solicitation(&self, note_id: &str, approve: bool, actor: &Actor) -> Result<Note> {
        let note = match self.store.get_entity(note_id)? {
            Some(Entity::Note(n)) if n.kind == NoteKind::Solicitation => n,
            _ => return Err(QuillflowError::not_found(format!("solicitation {note_id}"))),
        };
        let slot = self.paper_slot(&note.paper_id);
        let _paper = lock(&slot);
        let reviewer_slot = self.reviewer_slot(&note.signature);
        let _reviewer = lock(&reviewer_slot);

        let at = self.clock.now();
        let SolicitResponse {
            batch,
            note,
            assignment,
        } = self.assigner().plan_solicit_response(note_id, approve, actor, at)?;
        self.store.commit(batch)?;
        tracing::info!(
            "🙋 Solicitation of {} for paper {} {}",
            note.signature,
            note.paper_id,
            if approve { "approved" } else { "declined" }
        );

        let mut kinds = vec![EventKind::SolicitationAnswered {
            person: note.signature.clone(),
            approved: approve,
        }];
        let paper = match assignment {
            Some(plan) => {
                kinds.push(EventKind::Assigned {
                    role: AssignmentRole::Reviewer,
                    person: plan.edge.tail.clone(),
                    anon_id: plan.anon_group.id.clone(),
                });
                self.stored(plan.paper)
            }
            None => self.store.paper(&note.paper_id)?,
        };
        self.announce(&paper, actor, at, kinds);
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Setup, eic};
    use quillflow_core::error::QuillflowError;
    use quillflow_core::model::{AssignmentRole, InviteLabel};
    use quillflow_core::types::Actor;
    use quillflow_scheduler::EventKind;
    use quillflow_scheduler::policy::pending_sign_up_key;

    fn count_keys(s: &Setup, prefix: &str) -> usize {
        s.keys().iter().filter(|k| k.starts_with(prefix)).count()
    }

    #[test]
    fn test_invitation_accepted_by_active_profile() {
        let s = Setup::new();
        let paper = s.under_review("Sparse Attention");
        s.engine
            .invite_external(&paper.id, "rita@inst.org", AssignmentRole::Reviewer, &eic())
            .unwrap();
        let label = s.engine.respond_to_invitation(&paper.id, "rita@inst.org", true).unwrap();
        assert_eq!(label, InviteLabel::Accepted);
        assert_eq!(s.engine.pending_reviews("~Rita_Reviewer1").unwrap(), 1);

        let again = s.engine.respond_to_invitation(&paper.id, "rita@inst.org", false);
        assert!(again.is_err());
    }

    #[test]
    fn test_sign_up_supersedes_pending_notice() {
        let s = Setup::new();
        s.directory.add_pending_profile("~Gus_Guest1", "gus@uni.edu");
        let paper = s.under_review("Sparse Attention");
        s.engine
            .invite_external(&paper.id, "gus@uni.edu", AssignmentRole::Reviewer, &eic())
            .unwrap();
        let label = s.engine.respond_to_invitation(&paper.id, "gus@uni.edu", true).unwrap();
        assert_eq!(label, InviteLabel::PendingSignUp);
        let pending_key = pending_sign_up_key(&paper.id, "gus@uni.edu");
        assert!(s.keys().contains(&pending_key));

        // nothing to do until the profile is active
        assert_eq!(s.engine.process_pending_signups(), 0);
        s.directory.activate("~Gus_Guest1");
        assert_eq!(s.engine.process_pending_signups(), 1);
        assert_eq!(s.engine.process_pending_signups(), 0);

        let keys = s.keys();
        assert!(!keys.contains(&pending_key));
        assert!(keys.iter().any(|k| k.starts_with("sign_up_completed:")));
        assert!(s
            .engine
            .events()
            .iter()
            .any(|e| matches!(&e.kind, EventKind::Assigned { person, .. } if person == "~Gus_Guest1")));
    }

    #[test]
    fn test_blocked_sign_up_does_not_hold_up_others() {
        let s = Setup::new();
        s.directory.add_pending_profile("~Gus_Guest1", "gus@uni.edu");
        s.directory.add_pending_profile("~Hal_Guest1", "hal@uni.edu");
        let paper = s.under_review("Sparse Attention");
        for email in ["gus@uni.edu", "hal@uni.edu"] {
            s.engine
                .invite_external(&paper.id, email, AssignmentRole::Reviewer, &eic())
                .unwrap();
            s.engine.respond_to_invitation(&paper.id, email, true).unwrap();
        }

        // Gus turns out to have worked with the author
        s.directory.add_conflict("~Gus_Guest1", "~Ada_Author1");
        s.directory.activate("~Gus_Guest1");
        s.directory.activate("~Hal_Guest1");
        assert_eq!(s.engine.process_pending_signups(), 1);
        assert_eq!(s.engine.active_reviewers(&paper.id).unwrap(), vec!["~Hal_Guest1".to_string()]);

        let edges = s.engine.store().edges_for(&paper.id).unwrap();
        let gus = edges.iter().find(|e| e.is_invite() && e.tail == "gus@uni.edu").unwrap();
        assert!(!gus.is_active());
        assert_eq!(gus.label, Some(InviteLabel::Declined));
        assert_eq!(count_keys(&s, "sign_up_blocked:"), 1);
        assert!(s
            .engine
            .messages()
            .iter()
            .any(|m| m.key.starts_with("sign_up_blocked:") && m.is_for("~Alan_Editor1")));

        // nothing left to retry
        assert_eq!(s.engine.process_pending_signups(), 0);
        assert_eq!(count_keys(&s, "sign_up_blocked:"), 1);
    }

    #[test]
    fn test_solicitation_flow() {
        let s = Setup::new();
        let paper = s.under_review("Sparse Attention");
        let rita = Actor::reviewer("~Rita_Reviewer1");
        let note = s.engine.solicit_review(&paper.id, &rita, "Happy to help").unwrap();

        let outsider = Actor::action_editor("~Bea_Editor1");
        let err = s.engine.respond_to_solicitation(&note.id, true, &outsider).unwrap_err();
        assert!(matches!(err, QuillflowError::NotInvitee(_)));

        let ae = Actor::action_editor("~Alan_Editor1");
        s.engine.respond_to_solicitation(&note.id, true, &ae).unwrap();
        assert_eq!(s.engine.active_reviewers(&paper.id).unwrap(), vec!["~Rita_Reviewer1".to_string()]);
        assert!(s.keys().iter().any(|k| k.starts_with("solicitation_answered:")));
    }
}
