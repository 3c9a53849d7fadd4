//! Review solicitations: a reviewer volunteers for a paper, the action
//! editor approves or declines. Approval assigns through the same quota
//! ceiling as any other reviewer assignment.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::model::{AssignmentRole, Edit, EditKind, Entity, Note, NoteKind};
use quillflow_core::traits::Batch;
use quillflow_core::types::{Actor, PaperId, PaperState, Role, generate_id};
use quillflow_lifecycle::visibility::private_note_readers;
use quillflow_lifecycle::{REPLY_CAP, is_assigned_editor, is_editor_in_chief};

use crate::assigner::{AssignmentPlan, Assigner};

const STATUS: &str = "status";
const PENDING: &str = "pending";

#[derive(Debug, Clone)]
pub struct SolicitPlan {
    pub batch: Batch,
    pub note: Note,
}

#[derive(Debug, Clone)]
pub struct SolicitResponse {
    pub batch: Batch,
    pub note: Note,
    pub assignment: Option<AssignmentPlan>,
}

/// Whether a solicitation note still waits for the action editor.
pub fn is_pending(note: &Note) -> bool {
    note.kind == NoteKind::Solicitation && note.content.get(STATUS).and_then(Value::as_str) == Some(PENDING)
}

impl Assigner<'_> {
    pub fn plan_solicit(
        &self,
        paper_id: &PaperId,
        reviewer: &Actor,
        comment: &str,
        at: DateTime<Utc>,
    ) -> Result<SolicitPlan> {
        let paper = self.store.paper(paper_id)?;
        if reviewer.role != Role::Reviewer || paper.is_author(&reviewer.id) {
            return Err(QuillflowError::NotInvitee(format!(
                "{} cannot solicit to review paper {}",
                reviewer.id, paper.number
            )));
        }
        if paper.state != PaperState::UnderReview {
            return Err(QuillflowError::PaperNotEditable(format!(
                "paper {} is {}",
                paper.number, paper.state
            )));
        }
        let person = self.canonical(&reviewer.id);
        if self
            .store
            .edges_for(paper_id)?
            .iter()
            .any(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer) && e.tail == person)
        {
            return Err(QuillflowError::AlreadyMember(format!(
                "{person} already reviews paper {}",
                paper.number
            )));
        }
        if self
            .store
            .notes_for(paper_id)?
            .iter()
            .any(|n| n.signature == person && is_pending(n))
        {
            return Err(QuillflowError::invalid(REPLY_CAP));
        }
        self.check_conflicts(&paper, &person)?;

        let mut content = std::collections::BTreeMap::new();
        content.insert("solicit".to_string(), json!(comment));
        content.insert(STATUS.to_string(), json!(PENDING));
        let note = Note {
            id: generate_id("note"),
            paper_id: paper.id.clone(),
            kind: NoteKind::Solicitation,
            signature: person.clone(),
            anon_id: None,
            content,
            readers: private_note_readers(paper.number, &person, &self.ids),
            cdate: at,
            mdate: at,
            version: 0,
        };
        let mut batch = Batch::new();
        batch.put(Entity::Note(note.clone())).record(Edit::new(
            note.id.as_str(),
            EditKind::Note,
            reviewer,
            serde_json::to_value(&note)?,
            at,
        ));
        Ok(SolicitPlan { batch, note })
    }

    pub fn plan_solicit_response(
        &self,
        note_id: &str,
        approve: bool,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<SolicitResponse> {
        let mut note = match self.store.get_entity(note_id)? {
            Some(Entity::Note(n)) if n.kind == NoteKind::Solicitation => n,
            _ => return Err(QuillflowError::not_found(format!("solicitation {note_id}"))),
        };
        let paper = self.store.paper(&note.paper_id)?;
        if !(is_assigned_editor(&paper, actor) || is_editor_in_chief(actor, self.config)) {
            return Err(QuillflowError::NotInvitee(format!(
                "{} {} cannot answer solicitations for paper {}",
                actor.role, actor.id, paper.number
            )));
        }
        if !is_pending(&note) {
            return Err(QuillflowError::invalid(REPLY_CAP));
        }

        let assignment = if approve {
            let signature = note.signature.clone();
            Some(self.plan_assign_on_behalf(paper, &signature, AssignmentRole::Reviewer, actor, at)?)
        } else {
            None
        };
        note.content.insert(
            STATUS.to_string(),
            json!(if approve { "approved" } else { "declined" }),
        );
        note.mdate = at;

        let mut batch = Batch::new();
        batch.put(Entity::Note(note.clone())).record(Edit::new(
            note.id.as_str(),
            EditKind::Note,
            actor,
            json!({ STATUS: note.content.get(STATUS) }),
            at,
        ));
        if let Some(plan) = &assignment {
            batch.extend(plan.batch.clone());
        }
        Ok(SolicitResponse {
            batch,
            note,
            assignment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, eic};
    use quillflow_core::traits::RecordStore;

    #[test]
    fn test_solicit_then_approve() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let rita = Actor::reviewer("~Rita_Reviewer1");

        let plan = a.plan_solicit(&paper.id, &rita, "I know this area well", fx.now).unwrap();
        assert!(is_pending(&plan.note));
        assert!(plan.note.readers.contains("~Rita_Reviewer1"));
        fx.store.commit(plan.batch).unwrap();

        let dup = a.plan_solicit(&paper.id, &rita, "again", fx.now).unwrap_err();
        assert!(matches!(dup, QuillflowError::InvalidTransition(_)));

        let response = a.plan_solicit_response(&plan.note.id, true, &eic(), fx.now).unwrap();
        assert!(response.assignment.is_some());
        fx.store.commit(response.batch).unwrap();
        assert!(fx
            .store
            .edges_for(&paper.id)
            .unwrap()
            .iter()
            .any(|e| e.is_active() && e.tail == "~Rita_Reviewer1"));

        let twice = a.plan_solicit_response(&plan.note.id, false, &eic(), fx.now).unwrap_err();
        assert!(twice.to_string().contains(REPLY_CAP));
    }

    #[test]
    fn test_solicitation_approval_respects_quota() {
        let fx = Fixture::new();
        let busy = fx.paper(PaperState::UnderReview);
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let plan = a
            .plan_assign(&busy.id, "~Rita_Reviewer1", AssignmentRole::Reviewer, &eic(), fx.now)
            .unwrap();
        fx.store.commit(plan.batch).unwrap();

        let rita = Actor::reviewer("~Rita_Reviewer1");
        let solicit = a.plan_solicit(&paper.id, &rita, "", fx.now).unwrap();
        fx.store.commit(solicit.batch).unwrap();
        let err = a.plan_solicit_response(&solicit.note.id, true, &eic(), fx.now).unwrap_err();
        assert!(matches!(err, QuillflowError::QuotaExceeded(_)));
    }

    #[test]
    fn test_only_editors_answer() {
        let fx = Fixture::new();
        let paper = fx.paper(PaperState::UnderReview);
        let a = fx.assigner();
        let solicit = a
            .plan_solicit(&paper.id, &Actor::reviewer("~Rita_Reviewer1"), "", fx.now)
            .unwrap();
        fx.store.commit(solicit.batch).unwrap();
        let err = a
            .plan_solicit_response(&solicit.note.id, true, &Actor::action_editor("~Bea_Editor1"), fx.now)
            .unwrap_err();
        assert!(matches!(err, QuillflowError::NotInvitee(_)));
    }
}
