//! Task derivation: the open obligations of a paper.
//!
//! Tasks are never stored. They are recomputed from the paper, its edges,
//! its notes and any explicitly scheduled windows, so a task closes the
//! moment the record that fulfils it lands. Obligations of the review phase
//! disappear when the paper leaves the active pool; only camera-ready and
//! retraction work outlives acceptance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quillflow_core::config::{PeriodsConfig, VenueConfig};
use quillflow_core::error::Result;
use quillflow_core::groups::GroupIds;
use quillflow_core::model::{
    AssignmentRole, Edge, Note, NoteKind, Paper, PendingKind, TaskKind, TaskWindow,
};
use quillflow_core::traits::RecordStore;
use quillflow_core::types::{PaperId, PaperState, Role};

/// Where a derived task stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Activation lies in the future.
    Scheduled,
    Open,
    /// Past its expiry without being fulfilled.
    Expired,
}

/// An obligation owed by one person or group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// `{paper}/{kind}/{subject}`; stable while the obligation exists.
    pub id: String,
    pub kind: TaskKind,
    pub paper_id: PaperId,
    pub paper_number: u32,
    /// Profile id, or a group id for venue-level tasks.
    pub assignee: String,
    pub activation: DateTime<Utc>,
    pub due: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Task {
    pub fn target_role(&self) -> Role {
        self.kind.target_role()
    }

    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }

    /// Whole days past the due date, if the task is late.
    pub fn days_late(&self, now: DateTime<Utc>) -> Option<i64> {
        (now >= self.due).then(|| (now - self.due).num_days())
    }
}

/// A paper together with the records its tasks derive from.
#[derive(Debug, Clone)]
pub struct PaperSnapshot {
    pub paper: Paper,
    pub edges: Vec<Edge>,
    pub notes: Vec<Note>,
    pub windows: Vec<TaskWindow>,
}

impl PaperSnapshot {
    pub fn load(store: &dyn RecordStore, paper_id: &PaperId) -> Result<Self> {
        Ok(Self {
            paper: store.paper(paper_id)?,
            edges: store.edges_for(paper_id)?,
            notes: store.notes_for(paper_id)?,
            windows: store.windows_for(paper_id)?,
        })
    }

    /// Active reviewer assignments.
    pub fn reviewers(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer))
            .collect()
    }

    pub fn reviewer_ids(&self) -> Vec<String> {
        self.reviewers().iter().map(|e| e.tail.clone()).collect()
    }

    pub fn action_editor_edge(&self) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.is_active() && e.is_assignment(AssignmentRole::ActionEditor))
    }

    pub fn notes_of(&self, kind: NoteKind) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.kind == kind).collect()
    }

    pub fn has_note(&self, kind: NoteKind, person: &str) -> bool {
        self.notes
            .iter()
            .any(|n| n.kind == kind && n.signature == person)
    }

    pub fn window(&self, kind: TaskKind) -> Option<&TaskWindow> {
        self.windows.iter().find(|w| w.kind == kind)
    }
}

fn period_days(periods: &PeriodsConfig, kind: TaskKind) -> i64 {
    use TaskKind::*;
    match kind {
        ActionEditorAssignment => periods.ae_assignment,
        ReviewApproval => periods.review_approval,
        DeskRejectionApproval => periods.desk_rejection_approval,
        ReviewerAssignment => periods.reviewer_assignment,
        AssignmentAcknowledgement => periods.assignment_acknowledgement,
        Review => periods.review,
        OfficialRecommendation => periods.recommendation,
        Decision => periods.decision,
        DecisionApproval => periods.decision_approval,
        CameraReadyRevision => periods.camera_ready,
        CameraReadyVerification => periods.camera_ready_verification,
        RetractionApproval => periods.retraction_approval,
        SolicitationResponse => periods.solicitation_response,
    }
}

pub fn task_id(paper_id: &PaperId, kind: TaskKind, subject: &str) -> String {
    format!("{paper_id}/{}/{subject}", kind.slug())
}

struct Deriver<'a> {
    snapshot: &'a PaperSnapshot,
    config: &'a VenueConfig,
    now: DateTime<Utc>,
    out: Vec<Task>,
}

impl Deriver<'_> {
    /// Add a task triggered at `trigger`. A scheduled window for the kind
    /// replaces the derived activation and due date.
    fn push(&mut self, kind: TaskKind, assignee: &str, subject: &str, trigger: DateTime<Utc>) {
        let (activation, due) = match self.snapshot.window(kind) {
            Some(w) => (w.cdate, w.duedate),
            None => (
                trigger,
                trigger + PeriodsConfig::days(period_days(&self.config.periods, kind)),
            ),
        };
        let expiry = due + self.config.periods.expiry_grace();
        let status = if self.now < activation {
            TaskStatus::Scheduled
        } else if self.now >= expiry {
            TaskStatus::Expired
        } else {
            TaskStatus::Open
        };
        let paper = &self.snapshot.paper;
        self.out.push(Task {
            id: task_id(&paper.id, kind, subject),
            kind,
            paper_id: paper.id.clone(),
            paper_number: paper.number,
            assignee: assignee.to_string(),
            activation,
            due,
            expiry,
            status,
        });
    }
}

/// Every unfulfilled obligation of the paper, in any status.
pub fn derive_tasks(snapshot: &PaperSnapshot, config: &VenueConfig, now: DateTime<Utc>) -> Vec<Task> {
    let ids = GroupIds::new(&config.venue_id);
    let eic = ids.editors_in_chief();
    let paper = &snapshot.paper;
    let ae = paper.assigned_action_editor.clone();
    let handler = ae.clone().unwrap_or_else(|| eic.clone());
    let mut d = Deriver {
        snapshot,
        config,
        now,
        out: Vec::new(),
    };

    if let Some(p) = &paper.pending {
        let kind = match p.kind {
            PendingKind::DeskRejection { .. } => TaskKind::DeskRejectionApproval,
            PendingKind::Decision(_) => TaskKind::DecisionApproval,
            PendingKind::Retraction { .. } => TaskKind::RetractionApproval,
        };
        d.push(kind, &eic, &eic, p.requested_at);
    }

    if matches!(paper.state, PaperState::Submitted | PaperState::UnderReview)
        && snapshot.action_editor_edge().is_none()
    {
        // A removed editor restarts the clock.
        let trigger = snapshot
            .edges
            .iter()
            .filter(|e| e.is_assignment(AssignmentRole::ActionEditor))
            .filter_map(|e| e.deletion_time)
            .max()
            .unwrap_or(paper.cdate);
        d.push(TaskKind::ActionEditorAssignment, &eic, &eic, trigger);
    }

    if paper.state == PaperState::Submitted && paper.pending.is_none() {
        if let (Some(ae), Some(edge)) = (&ae, snapshot.action_editor_edge()) {
            d.push(TaskKind::ReviewApproval, ae, ae, edge.cdate);
        }
    }

    if paper.state == PaperState::UnderReview {
        let reviewers = snapshot.reviewers();
        if reviewers.len() < config.reviewing.number_of_reviewers {
            d.push(TaskKind::ReviewerAssignment, &handler, &handler, paper.state_changed_at);
        }
        for edge in &reviewers {
            if !snapshot.has_note(NoteKind::Acknowledgement, &edge.tail) {
                d.push(TaskKind::AssignmentAcknowledgement, &edge.tail, &edge.tail, edge.cdate);
            }
            if !snapshot.has_note(NoteKind::Review, &edge.tail) {
                d.push(TaskKind::Review, &edge.tail, &edge.tail, edge.cdate);
            }
        }
        for note in snapshot.notes_of(NoteKind::Solicitation) {
            if solicitation_pending(note) {
                d.push(TaskKind::SolicitationResponse, &handler, &note.signature, note.cdate);
            }
        }
        let recommendations = snapshot.notes_of(NoteKind::Recommendation);
        let all_in = !reviewers.is_empty()
            && reviewers
                .iter()
                .all(|e| snapshot.has_note(NoteKind::Recommendation, &e.tail));
        if all_in && paper.pending.is_none() {
            let trigger = recommendations
                .iter()
                .map(|n| n.cdate)
                .max()
                .unwrap_or(paper.state_changed_at);
            d.push(TaskKind::Decision, &handler, &handler, trigger);
        }
    }

    if matches!(paper.state, PaperState::UnderReview | PaperState::DecisionPending) {
        if let Some(window) = snapshot.window(TaskKind::OfficialRecommendation) {
            let cdate = window.cdate;
            for edge in snapshot.reviewers() {
                if !snapshot.has_note(NoteKind::Recommendation, &edge.tail) {
                    d.push(TaskKind::OfficialRecommendation, &edge.tail, &edge.tail, cdate);
                }
            }
        }
    }

    if paper.state == PaperState::Accepted {
        match (paper.camera_ready.submitted_at, paper.camera_ready.verified_at) {
            (None, _) => {
                let authors = ids.authors(paper.number);
                d.push(TaskKind::CameraReadyRevision, &authors, &authors, paper.state_changed_at);
            }
            (Some(submitted), None) => {
                d.push(TaskKind::CameraReadyVerification, &handler, &handler, submitted);
            }
            (Some(_), Some(_)) => {}
        }
    }

    d.out
}

/// Solicitations carry their answer in a `status` content field.
fn solicitation_pending(note: &Note) -> bool {
    note.content.get("status").and_then(|v| v.as_str()) == Some("pending")
}

/// Tasks that are active and unexpired at `now`.
pub fn open_tasks(snapshot: &PaperSnapshot, config: &VenueConfig, now: DateTime<Utc>) -> Vec<Task> {
    derive_tasks(snapshot, config, now)
        .into_iter()
        .filter(Task::is_open)
        .collect()
}
