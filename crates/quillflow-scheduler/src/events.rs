//! Workflow events: what happened to a paper, as observed by the
//! notification policy.
//!
//! Every event carries the paper as it stood right after the change and
//! the active reviewers at that moment, so message derivation needs no
//! further lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quillflow_core::config::EscalationAudience;
use quillflow_core::model::{AssignmentRole, InviteLabel, Paper, TaskKind};
use quillflow_core::types::{Actor, PaperState};

use crate::escalation::Escalation;
use crate::tasks::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub paper: Paper,
    /// Active reviewers of the paper.
    pub reviewers: Vec<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

/// Approval requests routed to the editors-in-chief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalSubject {
    DeskRejection,
    Decision,
    Retraction,
}

impl ApprovalSubject {
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalSubject::DeskRejection => "desk rejection",
            ApprovalSubject::Decision => "decision",
            ApprovalSubject::Retraction => "retraction",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Submitted,
    Revised,
    StateChanged {
        previous: PaperState,
    },
    ApprovalRequested {
        subject: ApprovalSubject,
    },
    ApprovalDeclined {
        subject: ApprovalSubject,
        requested_by: String,
    },
    CameraReadySubmitted,
    CameraReadyVerified,
    Assigned {
        role: AssignmentRole,
        person: String,
        anon_id: String,
    },
    Unassigned {
        role: AssignmentRole,
        person: String,
        had_review: bool,
    },
    Invited {
        role: AssignmentRole,
        invitee: String,
    },
    InvitationAnswered {
        invitee: String,
        label: InviteLabel,
    },
    SignUpCompleted {
        invitee: String,
        person: String,
    },
    /// The new profile could not be assigned; the invitation was closed.
    SignUpBlocked {
        invitee: String,
        person: String,
        reason: String,
    },
    SolicitationPosted {
        person: String,
    },
    SolicitationAnswered {
        person: String,
        approved: bool,
    },
    Acknowledged {
        person: String,
    },
    ReviewSubmitted {
        reviewer: String,
        count: usize,
    },
    ReviewsReleased {
        count: usize,
    },
    DiscussionStarted {
        recommendation_opens: DateTime<Utc>,
        recommendation_due: DateTime<Utc>,
    },
    RecommendationSubmitted {
        reviewer: String,
    },
    AllRecommendationsIn {
        decision_due: DateTime<Utc>,
    },
    TooManyReviewers {
        missing: Vec<String>,
    },
    TaskScheduled {
        task: TaskKind,
        cdate: DateTime<Utc>,
        duedate: DateTime<Utc>,
        /// Whether the reschedule moved any task between statuses.
        status_changed: bool,
    },
    TaskLate {
        task: Task,
        days_late: i64,
        /// `days_late` of the escalation step that fired.
        threshold: i64,
        wording: String,
        audiences: Vec<EscalationAudience>,
    },
    TasksExpired {
        tasks: Vec<String>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Submitted => "submitted",
            EventKind::Revised => "revised",
            EventKind::StateChanged { .. } => "state_changed",
            EventKind::ApprovalRequested { .. } => "approval_requested",
            EventKind::ApprovalDeclined { .. } => "approval_declined",
            EventKind::CameraReadySubmitted => "camera_ready_submitted",
            EventKind::CameraReadyVerified => "camera_ready_verified",
            EventKind::Assigned { .. } => "assigned",
            EventKind::Unassigned { .. } => "unassigned",
            EventKind::Invited { .. } => "invited",
            EventKind::InvitationAnswered { .. } => "invitation_answered",
            EventKind::SignUpCompleted { .. } => "sign_up_completed",
            EventKind::SignUpBlocked { .. } => "sign_up_blocked",
            EventKind::SolicitationPosted { .. } => "solicitation_posted",
            EventKind::SolicitationAnswered { .. } => "solicitation_answered",
            EventKind::Acknowledged { .. } => "acknowledged",
            EventKind::ReviewSubmitted { .. } => "review_submitted",
            EventKind::ReviewsReleased { .. } => "reviews_released",
            EventKind::DiscussionStarted { .. } => "discussion_started",
            EventKind::RecommendationSubmitted { .. } => "recommendation_submitted",
            EventKind::AllRecommendationsIn { .. } => "all_recommendations_in",
            EventKind::TooManyReviewers { .. } => "too_many_reviewers",
            EventKind::TaskScheduled { .. } => "task_scheduled",
            EventKind::TaskLate { .. } => "task_late",
            EventKind::TasksExpired { .. } => "tasks_expired",
        }
    }

    pub fn from_escalation(e: &Escalation) -> Self {
        EventKind::TaskLate {
            task: e.task.clone(),
            days_late: e.days_late,
            threshold: e.step.days_late,
            wording: e.step.wording.clone(),
            audiences: e.step.audiences.clone(),
        }
    }
}

impl WorkflowEvent {
    pub fn new(paper: &Paper, reviewers: Vec<String>, actor: &Actor, at: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            paper: paper.clone(),
            reviewers,
            actor: actor.clone(),
            at,
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
