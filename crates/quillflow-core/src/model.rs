//! Record-store entities: papers, notes, edges, groups, task windows and edits.
//!
//! Every entity is versioned by the store; the engine never deletes one.
//! Visibility is carried as opaque reader sets computed by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::groups::EVERYONE;
use crate::types::{Actor, EdgeId, PaperId, PaperState, Role};

/// Reader / writer list: group ids, profile ids or `everyone`.
pub type Readers = BTreeSet<String>;

pub fn readers<I, S>(items: I) -> Readers
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// A content field with an optional reader override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readers: Option<Readers>,
}

impl FieldValue {
    pub fn public(value: Value) -> Self {
        Self { value, readers: None }
    }

    pub fn restricted(value: Value, readers: Readers) -> Self {
        Self {
            value,
            readers: Some(readers),
        }
    }
}

pub type Content = BTreeMap<String, FieldValue>;

/// Answer to an evaluation criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

/// AE recommendation carried by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Accept as is")]
    AcceptAsIs,
    #[serde(rename = "Accept with minor revision")]
    AcceptWithMinorRevision,
    #[serde(rename = "Reject")]
    Reject,
}

impl Recommendation {
    pub fn is_accept(&self) -> bool {
        !matches!(self, Recommendation::Reject)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::AcceptAsIs => write!(f, "Accept as is"),
            Recommendation::AcceptWithMinorRevision => write!(f, "Accept with minor revision"),
            Recommendation::Reject => write!(f, "Reject"),
        }
    }
}

/// The AE's decision on a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// "Are the claims made in the submission supported by accurate, convincing and clear evidence?"
    pub claims_and_evidence: YesNo,
    /// "Would some individuals in the venue's audience be interested in the findings?"
    pub audience: YesNo,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub comment: String,
}

/// A request waiting for an editor-in-chief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingKind {
    DeskRejection { comment: String },
    Decision(Decision),
    Retraction { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub kind: PendingKind,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraReady {
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// A submission and everything its transitions decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: PaperId,
    pub number: u32,
    pub state: PaperState,
    pub content: Content,
    pub assigned_action_editor: Option<String>,
    pub pending: Option<PendingApproval>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub camera_ready: CameraReady,
    #[serde(default)]
    pub authors_revealed: bool,
    pub readers: Readers,
    pub writers: Readers,
    pub cdate: DateTime<Utc>,
    pub mdate: DateTime<Utc>,
    /// When the current `state` was entered.
    pub state_changed_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
}

impl Paper {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.content.get(name).map(|f| &f.value)
    }

    pub fn title(&self) -> &str {
        self.field("title").and_then(Value::as_str).unwrap_or("")
    }

    fn string_list(&self, name: &str) -> Vec<String> {
        self.field(name)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Profile ids or emails of the authors.
    pub fn author_ids(&self) -> Vec<String> {
        self.string_list("authorids")
    }

    pub fn author_names(&self) -> Vec<String> {
        self.string_list("authors")
    }

    pub fn is_author(&self, id: &str) -> bool {
        self.author_ids().iter().any(|a| a == id)
    }

    /// Effective readers of a field: its override, else the paper readers.
    pub fn field_readers(&self, name: &str) -> Option<Readers> {
        self.content
            .get(name)
            .map(|f| f.readers.clone().unwrap_or_else(|| self.readers.clone()))
    }

    /// Content as seen by someone belonging to `groups`.
    pub fn visible_content(&self, groups: &Readers) -> BTreeMap<String, Value> {
        self.content
            .iter()
            .filter(|(name, _)| {
                self.field_readers(name)
                    .is_some_and(|r| r.contains(EVERYONE) || !r.is_disjoint(groups))
            })
            .map(|(name, f)| (name.clone(), f.value.clone()))
            .collect()
    }
}

/// Replies attached to a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteKind {
    Review,
    Recommendation,
    Acknowledgement,
    Solicitation,
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteKind::Review => write!(f, "Review"),
            NoteKind::Recommendation => write!(f, "Official Recommendation"),
            NoteKind::Acknowledgement => write!(f, "Assignment Acknowledgement"),
            NoteKind::Solicitation => write!(f, "Solicit Review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub paper_id: PaperId,
    pub kind: NoteKind,
    /// Profile id of the writer.
    pub signature: String,
    /// Anonymous group the note is signed with, if any.
    pub anon_id: Option<String>,
    pub content: BTreeMap<String, Value>,
    pub readers: Readers,
    pub cdate: DateTime<Utc>,
    pub mdate: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
}

impl Note {
    pub fn is_public(&self) -> bool {
        self.readers.contains(EVERYONE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentRole {
    ActionEditor,
    Reviewer,
}

impl AssignmentRole {
    pub fn role(&self) -> Role {
        match self {
            AssignmentRole::ActionEditor => Role::ActionEditor,
            AssignmentRole::Reviewer => Role::Reviewer,
        }
    }
}

impl fmt::Display for AssignmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.role().fmt(f)
    }
}

/// Recruitment state of an external reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InviteLabel {
    #[serde(rename = "Invitation Sent")]
    InvitationSent,
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Declined")]
    Declined,
    #[serde(rename = "Pending Sign Up")]
    PendingSignUp,
}

impl fmt::Display for InviteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteLabel::InvitationSent => write!(f, "Invitation Sent"),
            InviteLabel::Accepted => write!(f, "Accepted"),
            InviteLabel::Declined => write!(f, "Declined"),
            InviteLabel::PendingSignUp => write!(f, "Pending Sign Up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Assignment(AssignmentRole),
    Invite(AssignmentRole),
}

/// Paper → person relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub paper_id: PaperId,
    /// Profile id or email.
    pub tail: String,
    pub kind: EdgeKind,
    pub weight: u8,
    pub label: Option<InviteLabel>,
    pub created_by: String,
    pub cdate: DateTime<Utc>,
    pub deletion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u32,
}

impl Edge {
    pub fn is_active(&self) -> bool {
        self.weight == 1 && self.deletion_time.is_none()
    }

    pub fn is_assignment(&self, role: AssignmentRole) -> bool {
        self.kind == EdgeKind::Assignment(role)
    }

    pub fn is_invite(&self) -> bool {
        matches!(self.kind, EdgeKind::Invite(_))
    }
}

/// Binds an anonymous group to the person it hides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousBinding {
    pub role: AssignmentRole,
    pub person: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub paper_id: Option<PaperId>,
    pub members: BTreeSet<String>,
    pub readers: Readers,
    pub anonymous: Option<AnonymousBinding>,
    pub cdate: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
}

/// Obligations the scheduler derives for a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    ActionEditorAssignment,
    ReviewApproval,
    DeskRejectionApproval,
    ReviewerAssignment,
    AssignmentAcknowledgement,
    Review,
    OfficialRecommendation,
    Decision,
    DecisionApproval,
    CameraReadyRevision,
    CameraReadyVerification,
    RetractionApproval,
    SolicitationResponse,
}

impl TaskKind {
    /// Role that owes the task.
    pub fn target_role(&self) -> Role {
        use TaskKind::*;
        match self {
            ActionEditorAssignment | DeskRejectionApproval | DecisionApproval
            | RetractionApproval => Role::EditorInChief,
            ReviewApproval | ReviewerAssignment | Decision | CameraReadyVerification
            | SolicitationResponse => Role::ActionEditor,
            AssignmentAcknowledgement | Review | OfficialRecommendation => Role::Reviewer,
            CameraReadyRevision => Role::Author,
        }
    }

    pub fn slug(&self) -> &'static str {
        use TaskKind::*;
        match self {
            ActionEditorAssignment => "ae_assignment",
            ReviewApproval => "review_approval",
            DeskRejectionApproval => "desk_rejection_approval",
            ReviewerAssignment => "reviewer_assignment",
            AssignmentAcknowledgement => "assignment_acknowledgement",
            Review => "review",
            OfficialRecommendation => "official_recommendation",
            Decision => "decision",
            DecisionApproval => "decision_approval",
            CameraReadyRevision => "camera_ready_revision",
            CameraReadyVerification => "camera_ready_verification",
            RetractionApproval => "retraction_approval",
            SolicitationResponse => "solicitation_response",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TaskKind::*;
        let s = match self {
            ActionEditorAssignment => "Action Editor Assignment",
            ReviewApproval => "Review Approval",
            DeskRejectionApproval => "Desk Rejection Approval",
            ReviewerAssignment => "Reviewer Assignment",
            AssignmentAcknowledgement => "Assignment Acknowledgement",
            Review => "Review",
            OfficialRecommendation => "Official Recommendation",
            Decision => "Decision",
            DecisionApproval => "Decision Approval",
            CameraReadyRevision => "Camera Ready Revision",
            CameraReadyVerification => "Camera Ready Verification",
            RetractionApproval => "Retraction Approval",
            SolicitationResponse => "Solicit Review Response",
        };
        f.write_str(s)
    }
}

/// An explicitly scheduled activation window, set by an editor action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWindow {
    pub id: String,
    pub paper_id: PaperId,
    pub kind: TaskKind,
    pub cdate: DateTime<Utc>,
    pub duedate: DateTime<Utc>,
    pub set_by: String,
    #[serde(default)]
    pub version: u32,
}

impl TaskWindow {
    pub fn window_id(paper_id: &PaperId, kind: TaskKind) -> String {
        format!("{paper_id}/window/{}", kind.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Transition,
    Assignment,
    Unassignment,
    Invitation,
    Note,
    Schedule,
    Group,
}

/// Audit-trail record of an accepted edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub id: String,
    pub entity_id: String,
    pub kind: EditKind,
    pub actor: Actor,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

impl Edit {
    pub fn new(entity_id: impl Into<String>, kind: EditKind, actor: &Actor, payload: Value, at: DateTime<Utc>) -> Self {
        Self {
            id: crate::types::generate_id("edit"),
            entity_id: entity_id.into(),
            kind,
            actor: actor.clone(),
            payload,
            at,
        }
    }
}

/// Anything the record store keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    Paper(Paper),
    Note(Note),
    Edge(Edge),
    Group(Group),
    Window(TaskWindow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Paper,
    Note,
    Edge,
    Group,
    Window,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Paper => "paper",
            EntityKind::Note => "note",
            EntityKind::Edge => "edge",
            EntityKind::Group => "group",
            EntityKind::Window => "window",
        }
    }
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Paper(p) => p.id.as_str(),
            Entity::Note(n) => &n.id,
            Entity::Edge(e) => e.id.as_str(),
            Entity::Group(g) => &g.id,
            Entity::Window(w) => &w.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Paper(_) => EntityKind::Paper,
            Entity::Note(_) => EntityKind::Note,
            Entity::Edge(_) => EntityKind::Edge,
            Entity::Group(_) => EntityKind::Group,
            Entity::Window(_) => EntityKind::Window,
        }
    }

    pub fn paper_id(&self) -> Option<&PaperId> {
        match self {
            Entity::Paper(p) => Some(&p.id),
            Entity::Note(n) => Some(&n.paper_id),
            Entity::Edge(e) => Some(&e.paper_id),
            Entity::Group(g) => g.paper_id.as_ref(),
            Entity::Window(w) => Some(&w.paper_id),
        }
    }

    /// Person the entity is keyed on, used by `Query::person`.
    pub fn person(&self) -> Option<&str> {
        match self {
            Entity::Note(n) => Some(&n.signature),
            Entity::Edge(e) => Some(&e.tail),
            Entity::Group(g) => g.anonymous.as_ref().map(|b| b.person.as_str()),
            Entity::Paper(_) | Entity::Window(_) => None,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Entity::Paper(p) => p.version,
            Entity::Note(n) => n.version,
            Entity::Edge(e) => e.version,
            Entity::Group(g) => g.version,
            Entity::Window(w) => w.version,
        }
    }

    pub fn set_version(&mut self, version: u32) {
        match self {
            Entity::Paper(p) => p.version = version,
            Entity::Note(n) => n.version = version,
            Entity::Edge(e) => e.version = version,
            Entity::Group(g) => g.version = version,
            Entity::Window(w) => w.version = version,
        }
    }
}

/// Filter for `RecordStore::query`. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub kind: Option<EntityKind>,
    pub paper_id: Option<PaperId>,
    pub person: Option<String>,
}

impl Query {
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn paper(mut self, paper_id: &PaperId) -> Self {
        self.paper_id = Some(paper_id.clone());
        self
    }

    pub fn person(mut self, person: &str) -> Self {
        self.person = Some(person.to_string());
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.kind.is_none_or(|k| entity.kind() == k)
            && self
                .paper_id
                .as_ref()
                .is_none_or(|p| entity.paper_id() == Some(p))
            && self
                .person
                .as_deref()
                .is_none_or(|p| entity.person() == Some(p))
    }
}
