//! Assignment edges: creation, removal and action editor replacement.
//!
//! The assigner validates against the record store and returns a plan
//! holding every entity and edit the change needs. The engine commits the
//! plan's batch while holding the paper lock (and the reviewer lock for
//! reviewer assignments), so a plan is all-or-nothing.

use chrono::{DateTime, Utc};
use serde_json::json;

use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::groups::GroupIds;
use quillflow_core::model::{
    AssignmentRole, Edge, EdgeKind, Edit, EditKind, Entity, Group, NoteKind, Paper, readers,
};
use quillflow_core::traits::{Batch, IdentityOracle, RecordStore};
use quillflow_core::types::{Actor, EdgeId, PaperId, PaperState, Role};
use quillflow_lifecycle::replay::ACTION_EDITOR_KEY;
use quillflow_lifecycle::{is_assigned_editor, is_editor_in_chief};

use crate::anonymous::ensure_group;
use crate::quota::check_quota;

pub const EDGE_CAP: &str = "maximum number (1) of edges reached";

/// A validated assignment, ready to commit.
#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    pub batch: Batch,
    pub edge: Edge,
    /// The paper after the change.
    pub paper: Paper,
    pub anon_group: Group,
    /// Action editor edge removed by a replacement.
    pub replaced: Option<Edge>,
}

/// A validated removal, ready to commit.
#[derive(Debug, Clone)]
pub struct UnassignmentPlan {
    pub batch: Batch,
    pub edge: Edge,
    pub paper: Paper,
    /// The removed reviewer had already submitted a review.
    pub had_review: bool,
}

pub struct Assigner<'a> {
    pub(crate) store: &'a dyn RecordStore,
    pub(crate) oracle: &'a dyn IdentityOracle,
    pub(crate) config: &'a VenueConfig,
    pub(crate) ids: GroupIds,
}

impl<'a> Assigner<'a> {
    pub fn new(store: &'a dyn RecordStore, oracle: &'a dyn IdentityOracle, config: &'a VenueConfig) -> Self {
        Self {
            store,
            oracle,
            config,
            ids: GroupIds::new(&config.venue_id),
        }
    }

    pub fn ids(&self) -> &GroupIds {
        &self.ids
    }

    /// Profile id when the oracle knows the person, else the raw value.
    pub fn canonical(&self, person: &str) -> String {
        self.oracle
            .resolve(person)
            .unwrap_or_else(|| person.to_string())
    }

    /// Authors never touch assignments of their own paper; action editor
    /// edges belong to the editors-in-chief, reviewer edges also to the
    /// paper's action editor.
    pub(crate) fn authorize(&self, paper: &Paper, role: AssignmentRole, actor: &Actor) -> Result<()> {
        if actor.role == Role::Author || paper.is_author(&actor.id) {
            return Err(QuillflowError::NotInvitee(format!(
                "authors of paper {} cannot edit its assignments",
                paper.number
            )));
        }
        let allowed = match role {
            AssignmentRole::ActionEditor => is_editor_in_chief(actor, self.config),
            AssignmentRole::Reviewer => {
                is_editor_in_chief(actor, self.config) || is_assigned_editor(paper, actor)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(QuillflowError::NotInvitee(format!(
                "{} {} cannot assign {role}s to paper {}",
                actor.role, actor.id, paper.number
            )))
        }
    }

    /// Reviews of the paper are visible to everyone once enough are in.
    pub fn reviews_released(&self, paper_id: &PaperId) -> Result<bool> {
        let submitted = self
            .store
            .notes_for(paper_id)?
            .iter()
            .filter(|n| n.kind == NoteKind::Review)
            .count();
        Ok(submitted >= self.config.reviewing.review_publication_threshold)
    }

    pub(crate) fn check_editable(&self, paper: &Paper, role: AssignmentRole) -> Result<()> {
        let editable = match role {
            AssignmentRole::ActionEditor => paper.state.is_active(),
            AssignmentRole::Reviewer => paper.state == PaperState::UnderReview,
        };
        if editable {
            Ok(())
        } else {
            Err(QuillflowError::PaperNotEditable(format!(
                "paper {} is {}",
                paper.number, paper.state
            )))
        }
    }

    pub(crate) fn check_conflicts(&self, paper: &Paper, person: &str) -> Result<()> {
        if paper.is_author(person) {
            return Err(QuillflowError::ConflictDetected(format!(
                "{person} is an author of paper {}",
                paper.number
            )));
        }
        match paper
            .author_ids()
            .iter()
            .find(|author| self.oracle.has_conflict(person, author))
        {
            Some(author) => Err(QuillflowError::ConflictDetected(format!(
                "{person} has a conflict of interest with {author}"
            ))),
            None => Ok(()),
        }
    }

    /// Role group of the paper (`.../Reviewers` or `.../Action_Editors`),
    /// created on first use.
    pub(crate) fn role_group(&self, paper: &Paper, role: AssignmentRole, at: DateTime<Utc>) -> Result<Group> {
        let id = match role {
            AssignmentRole::ActionEditor => self.ids.action_editors(paper.number),
            AssignmentRole::Reviewer => self.ids.reviewers(paper.number),
        };
        Ok(self.store.group(&id)?.unwrap_or_else(|| Group {
            id,
            paper_id: Some(paper.id.clone()),
            members: Default::default(),
            readers: readers([
                self.ids.venue(),
                self.ids.editors_in_chief(),
                self.ids.action_editors(paper.number),
            ]),
            anonymous: None,
            cdate: at,
            version: 0,
        }))
    }

    /// Validate and plan `assign(paper, person, role)`.
    pub fn plan_assign(
        &self,
        paper_id: &PaperId,
        person: &str,
        role: AssignmentRole,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<AssignmentPlan> {
        let paper = self.store.paper(paper_id)?;
        self.authorize(&paper, role, actor)?;
        self.build(paper, person, role, actor, at, None)
    }

    /// Assignment on behalf of an accepted invitation or solicitation; the
    /// actor was authorized when the invitation was issued.
    pub(crate) fn plan_assign_on_behalf(
        &self,
        paper: Paper,
        person: &str,
        role: AssignmentRole,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<AssignmentPlan> {
        self.build(paper, person, role, actor, at, None)
    }

    /// Swap the paper's action editor in one batch.
    pub fn plan_replace_action_editor(
        &self,
        paper_id: &PaperId,
        person: &str,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<AssignmentPlan> {
        let paper = self.store.paper(paper_id)?;
        self.authorize(&paper, AssignmentRole::ActionEditor, actor)?;
        let current = self
            .store
            .edges_for(paper_id)?
            .into_iter()
            .find(|e| e.is_active() && e.is_assignment(AssignmentRole::ActionEditor));
        match current {
            Some(old) => self.build(paper, person, AssignmentRole::ActionEditor, actor, at, Some(old)),
            None => self.build(paper, person, AssignmentRole::ActionEditor, actor, at, None),
        }
    }

    fn build(
        &self,
        mut paper: Paper,
        person: &str,
        role: AssignmentRole,
        actor: &Actor,
        at: DateTime<Utc>,
        replacing: Option<Edge>,
    ) -> Result<AssignmentPlan> {
        self.check_editable(&paper, role)?;
        let person = self.canonical(person);
        let edges = self.store.edges_for(&paper.id)?;
        let replaced_id = replacing.as_ref().map(|e| e.id.clone());

        let duplicate = edges.iter().any(|e| {
            e.is_active()
                && e.is_assignment(role)
                && Some(&e.id) != replaced_id.as_ref()
                && (role == AssignmentRole::ActionEditor || e.tail == person)
        });
        if duplicate {
            return Err(QuillflowError::DuplicateAssignment(EDGE_CAP.to_string()));
        }

        self.check_conflicts(&paper, &person)?;
        if role == AssignmentRole::Reviewer {
            check_quota(self.store, &person, self.config, at)?;
        }

        let mut batch = Batch::new();
        let mut role_group = self.role_group(&paper, role, at)?;

        if let Some(old) = &replacing {
            let mut removed = old.clone();
            removed.deletion_time = Some(at);
            role_group.members.remove(&removed.tail);
            batch
                .put(Entity::Edge(removed.clone()))
                .record(Edit::new(
                    removed.id.as_str(),
                    EditKind::Unassignment,
                    actor,
                    serde_json::to_value(&removed)?,
                    at,
                ));
        }

        let edge = Edge {
            id: EdgeId::generate(),
            paper_id: paper.id.clone(),
            tail: person.clone(),
            kind: EdgeKind::Assignment(role),
            weight: 1,
            label: None,
            created_by: actor.id.clone(),
            cdate: at,
            deletion_time: None,
            version: 0,
        };
        batch.put(Entity::Edge(edge.clone())).record(Edit::new(
            edge.id.as_str(),
            EditKind::Assignment,
            actor,
            serde_json::to_value(&edge)?,
            at,
        ));

        let groups = self.store.groups_for(&paper.id)?;
        let released = self.reviews_released(&paper.id)?;
        let (anon_group, fresh) = ensure_group(&paper, &groups, role, &person, released, &self.ids, at);
        if fresh {
            batch.put(Entity::Group(anon_group.clone())).record(Edit::new(
                anon_group.id.as_str(),
                EditKind::Group,
                actor,
                json!({ "members": [person], "role": role }),
                at,
            ));
        }

        role_group.members.insert(person.clone());
        batch.put(Entity::Group(role_group.clone())).record(Edit::new(
            role_group.id.as_str(),
            EditKind::Group,
            actor,
            json!({ "members": role_group.members }),
            at,
        ));

        if role == AssignmentRole::ActionEditor {
            paper.assigned_action_editor = Some(person.clone());
            batch.put(Entity::Paper(paper.clone())).record(Edit::new(
                paper.id.as_str(),
                EditKind::Assignment,
                actor,
                json!({ ACTION_EDITOR_KEY: person }),
                at,
            ));
        }

        Ok(AssignmentPlan {
            batch,
            edge,
            paper,
            anon_group,
            replaced: replacing,
        })
    }

    /// Validate and plan `unassign(edge)`.
    pub fn plan_unassign(&self, edge_id: &EdgeId, actor: &Actor, at: DateTime<Utc>) -> Result<UnassignmentPlan> {
        let mut edge = match self.store.get_entity(edge_id.as_str())? {
            Some(Entity::Edge(e)) => e,
            _ => return Err(QuillflowError::not_found(format!("edge {edge_id}"))),
        };
        let role = match edge.kind {
            EdgeKind::Assignment(role) if edge.is_active() => role,
            _ => {
                return Err(QuillflowError::invalid(format!(
                    "edge {edge_id} is not an active assignment"
                )));
            }
        };
        let mut paper = self.store.paper(&edge.paper_id)?;
        self.authorize(&paper, role, actor)?;
        if paper.state.is_terminal() {
            return Err(QuillflowError::PaperNotEditable(format!(
                "paper {} is {}",
                paper.number, paper.state
            )));
        }

        let had_review = self
            .store
            .notes_for(&paper.id)?
            .iter()
            .any(|n| n.kind == NoteKind::Review && n.signature == edge.tail);

        edge.deletion_time = Some(at);
        let mut batch = Batch::new();
        batch.put(Entity::Edge(edge.clone())).record(Edit::new(
            edge.id.as_str(),
            EditKind::Unassignment,
            actor,
            serde_json::to_value(&edge)?,
            at,
        ));

        let mut role_group = self.role_group(&paper, role, at)?;
        if role_group.members.remove(&edge.tail) {
            batch.put(Entity::Group(role_group.clone())).record(Edit::new(
                role_group.id.as_str(),
                EditKind::Group,
                actor,
                json!({ "members": role_group.members }),
                at,
            ));
        }

        if role == AssignmentRole::ActionEditor && paper.assigned_action_editor.as_deref() == Some(edge.tail.as_str()) {
            paper.assigned_action_editor = None;
            batch.put(Entity::Paper(paper.clone())).record(Edit::new(
                paper.id.as_str(),
                EditKind::Unassignment,
                actor,
                json!({ ACTION_EDITOR_KEY: null }),
                at,
            ));
        }

        Ok(UnassignmentPlan {
            batch,
            edge,
            paper,
            had_review,
        })
    }
}
