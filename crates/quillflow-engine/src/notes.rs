//! Replies on a paper (acknowledgements, reviews, official
//! recommendations) and explicitly scheduled task windows.
//!
//! Reviews stay with the editors and their signer until
//! `review_publication_threshold` of them are in; the review that reaches
//! the threshold opens every review of the paper to everyone in the same
//! batch.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use quillflow_assign::anonymous::find_binding;
use quillflow_core::config::{PeriodsConfig, VenueConfig};
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::groups::EVERYONE;
use quillflow_core::locks::lock;
use quillflow_core::model::{
    AssignmentRole, Edit, EditKind, Entity, Group, Note, NoteKind, Paper, Recommendation, TaskKind, TaskWindow,
    readers,
};
use quillflow_core::traits::Batch;
use quillflow_core::types::{Actor, PaperId, PaperState, generate_id};
use quillflow_lifecycle::visibility::{anonymous_group_readers, private_note_readers};
use quillflow_lifecycle::{REPLY_CAP, is_editor_in_chief};
use quillflow_scheduler::{EventKind, PaperSnapshot, TaskStatus, derive_tasks};

use crate::engine::Engine;

/// Content field carrying the reviewer's recommendation.
pub const RECOMMENDATION_FIELD: &str = "decision_recommendation";

const ACKNOWLEDGEMENT: &str =
    "I acknowledge my responsibility to submit a review for this submission by the end of the review period.";

impl Engine {
    fn require_state(&self, paper: &Paper, allowed: &[PaperState]) -> Result<()> {
        if allowed.contains(&paper.state) {
            Ok(())
        } else {
            Err(QuillflowError::PaperNotEditable(format!(
                "paper {} is {}",
                paper.number, paper.state
            )))
        }
    }

    fn require_reviewer(&self, paper: &Paper, person: &str) -> Result<()> {
        if self.active_reviewers(&paper.id)?.iter().any(|r| r == person) {
            Ok(())
        } else {
            Err(QuillflowError::NotInvitee(format!(
                "{person} is not a reviewer of paper {}",
                paper.number
            )))
        }
    }

    /// A reviewer reply signed with the reviewer's anonymous group.
    fn signed_note(
        &self,
        paper: &Paper,
        kind: NoteKind,
        person: &str,
        content: BTreeMap<String, Value>,
        at: DateTime<Utc>,
    ) -> Result<Note> {
        let groups = self.store.groups_for(&paper.id)?;
        let anon_id = find_binding(&groups, AssignmentRole::Reviewer, person).map(|g| g.id.clone());
        let readers = private_note_readers(paper.number, anon_id.as_deref().unwrap_or(person), &self.ids);
        Ok(Note {
            id: generate_id("note"),
            paper_id: paper.id.clone(),
            kind,
            signature: person.to_string(),
            anon_id,
            content,
            readers,
            cdate: at,
            mdate: at,
            version: 0,
        })
    }

    /// The reviewer confirms the assignment.
    pub fn acknowledge_assignment(&self, paper_id: &PaperId, actor: &Actor) -> Result<Note> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();
        let person = self.assigner().canonical(&actor.id);

        let paper = self.store.paper(paper_id)?;
        self.require_state(&paper, &[PaperState::UnderReview])?;
        self.require_reviewer(&paper, &person)?;
        let notes = self.store.notes_for(paper_id)?;
        if notes
            .iter()
            .any(|n| n.kind == NoteKind::Acknowledgement && n.signature == person)
        {
            return Err(QuillflowError::invalid(REPLY_CAP));
        }

        let mut content = BTreeMap::new();
        content.insert("acknowledgement".to_string(), json!(ACKNOWLEDGEMENT));
        let note = self.signed_note(&paper, NoteKind::Acknowledgement, &person, content, at)?;
        let mut batch = Batch::new();
        batch.put(Entity::Note(note.clone())).record(Edit::new(
            note.id.as_str(),
            EditKind::Note,
            actor,
            serde_json::to_value(&note)?,
            at,
        ));
        self.store.commit(batch)?;
        tracing::debug!("🤝 {} acknowledged paper {}", person, paper.number);

        self.announce(&paper, actor, at, vec![EventKind::Acknowledged { person }]);
        Ok(note)
    }

    /// Post the reviewer's review.
    pub fn submit_review(&self, paper_id: &PaperId, actor: &Actor, content: BTreeMap<String, Value>) -> Result<Note> {
        let slot = self.paper_slot(paper_id);
        let _paper = lock(&slot);
        let person = self.assigner().canonical(&actor.id);
        let reviewer_slot = self.reviewer_slot(&person);
        let _reviewer = lock(&reviewer_slot);
        let at = self.clock.now();

        let paper = self.store.paper(paper_id)?;
        self.require_state(&paper, &[PaperState::UnderReview])?;
        self.require_reviewer(&paper, &person)?;
        let reviews: Vec<Note> = self
            .store
            .notes_for(paper_id)?
            .into_iter()
            .filter(|n| n.kind == NoteKind::Review)
            .collect();
        if reviews.iter().any(|n| n.signature == person) {
            return Err(QuillflowError::invalid(REPLY_CAP));
        }

        let threshold = self.config.reviewing.review_publication_threshold;
        let count = reviews.len() + 1;
        let releasing = count == threshold;
        let mut note = self.signed_note(&paper, NoteKind::Review, &person, content, at)?;
        if count >= threshold {
            note.readers = readers([EVERYONE]);
        }

        let mut batch = Batch::new();
        batch.put(Entity::Note(note.clone())).record(Edit::new(
            note.id.as_str(),
            EditKind::Note,
            actor,
            serde_json::to_value(&note)?,
            at,
        ));
        if releasing {
            self.release_reviews(&paper, reviews.clone(), &mut batch, at)?;
        }
        self.mark_submitted(&paper, &person, &mut batch, at)?;

        let mut reviewed: Vec<&str> = reviews.iter().map(|n| n.signature.as_str()).collect();
        reviewed.push(&person);
        let active = self.active_reviewers(paper_id)?;
        let existing_window = self
            .store
            .windows_for(paper_id)?
            .into_iter()
            .find(|w| w.kind == TaskKind::OfficialRecommendation);
        let scheduled = match existing_window {
            Some(_) => None,
            None => self.plan_recommendation_window(&paper, &reviewed, &active, actor, &mut batch, at)?,
        };
        self.store.commit(batch)?;
        tracing::info!("📝 Review {} of {} in for paper {}", count, threshold, paper.number);

        let mut kinds = vec![EventKind::ReviewSubmitted {
            reviewer: person.clone(),
            count,
        }];
        if releasing {
            let (opens, due) = match scheduled.as_ref().or(existing_window.as_ref()) {
                Some(w) => (w.cdate, w.duedate),
                None => {
                    let opens = at + PeriodsConfig::days(self.config.periods.discussion);
                    (opens, opens + PeriodsConfig::days(self.config.periods.recommendation))
                }
            };
            kinds.push(EventKind::ReviewsReleased { count });
            kinds.push(EventKind::DiscussionStarted {
                recommendation_opens: opens,
                recommendation_due: due,
            });
        } else if let Some(w) = &scheduled {
            kinds.push(EventKind::TaskScheduled {
                task: w.kind,
                cdate: w.cdate,
                duedate: w.duedate,
                status_changed: false,
            });
        }
        self.announce(&paper, actor, at, kinds);
        Ok(note)
    }

    /// Open the recommendation window after the discussion period once
    /// every active reviewer has reviewed and enough reviews are in.
    /// `reviewed` are the signers of the paper's reviews and `active` its
    /// reviewers as of the edit being planned. The caller checks that no
    /// window exists yet.
    pub(crate) fn plan_recommendation_window(
        &self,
        paper: &Paper,
        reviewed: &[&str],
        active: &[String],
        actor: &Actor,
        batch: &mut Batch,
        at: DateTime<Utc>,
    ) -> Result<Option<TaskWindow>> {
        let all_reviewed = !active.is_empty() && active.iter().all(|r| reviewed.contains(&r.as_str()));
        if paper.state != PaperState::UnderReview
            || !all_reviewed
            || reviewed.len() < self.config.reviewing.number_of_reviewers
        {
            return Ok(None);
        }
        let periods = &self.config.periods;
        let cdate = at + PeriodsConfig::days(periods.discussion);
        let window = TaskWindow {
            id: TaskWindow::window_id(&paper.id, TaskKind::OfficialRecommendation),
            paper_id: paper.id.clone(),
            kind: TaskKind::OfficialRecommendation,
            cdate,
            duedate: cdate + PeriodsConfig::days(periods.recommendation),
            set_by: actor.id.clone(),
            version: 0,
        };
        batch.put(Entity::Window(window.clone())).record(Edit::new(
            window.id.as_str(),
            EditKind::Schedule,
            &Actor::venue(),
            serde_json::to_value(&window)?,
            at,
        ));
        tracing::debug!("🗓️ Recommendations for paper {} open {}", paper.number, cdate);
        Ok(Some(window))
    }

    /// Open earlier reviews and the reviewers' anonymous groups.
    fn release_reviews(&self, paper: &Paper, reviews: Vec<Note>, batch: &mut Batch, at: DateTime<Utc>) -> Result<()> {
        let venue = Actor::venue();
        for mut review in reviews {
            review.readers = readers([EVERYONE]);
            batch.put(Entity::Note(review.clone())).record(Edit::new(
                review.id.as_str(),
                EditKind::Note,
                &venue,
                json!({ "readers": review.readers }),
                at,
            ));
        }
        for mut group in self.store.groups_for(&paper.id)? {
            let reviewer = group
                .anonymous
                .as_ref()
                .is_some_and(|b| b.role == AssignmentRole::Reviewer);
            if !reviewer {
                continue;
            }
            group.readers = anonymous_group_readers(paper.number, &group.id, true, &self.ids);
            batch.put(Entity::Group(group.clone())).record(Edit::new(
                group.id.as_str(),
                EditKind::Group,
                &venue,
                json!({ "readers": group.readers }),
                at,
            ));
        }
        tracing::info!("🔓 Reviews of paper {} released", paper.number);
        Ok(())
    }

    fn mark_submitted(&self, paper: &Paper, person: &str, batch: &mut Batch, at: DateTime<Utc>) -> Result<()> {
        let id = self.ids.reviewers_submitted(paper.number);
        let mut group = self.store.group(&id)?.unwrap_or_else(|| Group {
            id: id.clone(),
            paper_id: Some(paper.id.clone()),
            members: Default::default(),
            readers: readers([
                self.ids.venue(),
                self.ids.editors_in_chief(),
                self.ids.action_editors(paper.number),
                id.clone(),
            ]),
            anonymous: None,
            cdate: at,
            version: 0,
        });
        if group.members.insert(person.to_string()) {
            batch.put(Entity::Group(group.clone())).record(Edit::new(
                group.id.as_str(),
                EditKind::Group,
                &Actor::venue(),
                json!({ "members": group.members }),
                at,
            ));
        }
        Ok(())
    }

    /// Post or edit the reviewer's official recommendation.
    pub fn submit_recommendation(
        &self,
        paper_id: &PaperId,
        actor: &Actor,
        content: BTreeMap<String, Value>,
    ) -> Result<Note> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();
        let person = self.assigner().canonical(&actor.id);

        let paper = self.store.paper(paper_id)?;
        self.require_state(&paper, &[PaperState::UnderReview, PaperState::DecisionPending])?;
        self.require_reviewer(&paper, &person)?;
        let recommendation = content
            .get(RECOMMENDATION_FIELD)
            .cloned()
            .ok_or_else(|| QuillflowError::invalid(format!("{RECOMMENDATION_FIELD} is required")))
            .and_then(|v| {
                serde_json::from_value::<Recommendation>(v)
                    .map_err(|e| QuillflowError::invalid(format!("{RECOMMENDATION_FIELD}: {e}")))
            })?;

        let window = self
            .store
            .windows_for(paper_id)?
            .into_iter()
            .find(|w| w.kind == TaskKind::OfficialRecommendation);
        match &window {
            Some(w) if at >= w.cdate => {}
            _ => {
                return Err(QuillflowError::invalid(format!(
                    "official recommendations for paper {} are not open yet",
                    paper.number
                )));
            }
        }

        let active = self.active_reviewers(paper_id)?;
        let recommendations: Vec<Note> = self
            .store
            .notes_for(paper_id)?
            .into_iter()
            .filter(|n| n.kind == NoteKind::Recommendation)
            .collect();
        let has = |who: &str| recommendations.iter().any(|n| n.signature == who);
        let all_in_before = !active.is_empty() && active.iter().all(|r| has(r.as_str()));

        let existing = recommendations.iter().find(|n| n.signature == person).cloned();
        let fresh = existing.is_none();
        let note = match existing {
            Some(mut note) => {
                note.content = content;
                note.mdate = at;
                note
            }
            None => self.signed_note(&paper, NoteKind::Recommendation, &person, content, at)?,
        };
        let mut batch = Batch::new();
        batch.put(Entity::Note(note.clone())).record(Edit::new(
            note.id.as_str(),
            EditKind::Note,
            actor,
            serde_json::to_value(&note)?,
            at,
        ));
        self.store.commit(batch)?;
        tracing::info!("🗳️ {} recommends {} for paper {}", person, recommendation, paper.number);

        let missing: Vec<String> = active
            .iter()
            .filter(|r| r.as_str() != person && !has(r.as_str()))
            .cloned()
            .collect();
        let recommended = active.len() - missing.len();
        let mut kinds = vec![EventKind::RecommendationSubmitted {
            reviewer: person.clone(),
        }];
        if !all_in_before && missing.is_empty() {
            kinds.push(EventKind::AllRecommendationsIn {
                decision_due: at + PeriodsConfig::days(self.config.periods.decision),
            });
        } else if fresh && !missing.is_empty() && recommended == self.config.reviewing.number_of_reviewers {
            kinds.push(EventKind::TooManyReviewers { missing });
        }
        self.announce(&paper, actor, at, kinds);
        Ok(note)
    }

    /// Set the activation window of a task kind on one paper.
    pub fn schedule_task(
        &self,
        paper_id: &PaperId,
        kind: TaskKind,
        cdate: DateTime<Utc>,
        duedate: DateTime<Utc>,
        actor: &Actor,
    ) -> Result<TaskWindow> {
        if !is_editor_in_chief(actor, &self.config) {
            return Err(QuillflowError::NotInvitee(format!(
                "{} {} cannot schedule tasks",
                actor.role, actor.id
            )));
        }
        if duedate <= cdate {
            return Err(QuillflowError::invalid("due date must come after the activation date"));
        }
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();

        let before = PaperSnapshot::load(self.store.as_ref(), paper_id)?;
        if before.paper.state.is_terminal() && before.paper.state != PaperState::Accepted {
            return Err(QuillflowError::PaperNotEditable(format!(
                "paper {} is {}",
                before.paper.number, before.paper.state
            )));
        }
        let window = TaskWindow {
            id: TaskWindow::window_id(paper_id, kind),
            paper_id: paper_id.clone(),
            kind,
            cdate,
            duedate,
            set_by: actor.id.clone(),
            version: 0,
        };
        let mut after = before.clone();
        after.windows.retain(|w| w.kind != kind);
        after.windows.push(window.clone());
        let status_changed = statuses(&before, &self.config, kind, at) != statuses(&after, &self.config, kind, at);

        let mut batch = Batch::new();
        batch.put(Entity::Window(window.clone())).record(Edit::new(
            window.id.as_str(),
            EditKind::Schedule,
            actor,
            serde_json::to_value(&window)?,
            at,
        ));
        self.store.commit(batch)?;
        tracing::info!(
            "📅 {} of paper {} scheduled {} → {}",
            kind,
            before.paper.number,
            cdate.to_rfc3339(),
            duedate.to_rfc3339()
        );

        let event = EventKind::TaskScheduled {
            task: kind,
            cdate,
            duedate,
            status_changed,
        };
        self.announce(&before.paper, actor, at, vec![event]);
        Ok(window)
    }
}

/// Status of every task of `kind`, ordered by task id.
fn statuses(snapshot: &PaperSnapshot, config: &VenueConfig, kind: TaskKind, now: DateTime<Utc>) -> Vec<(String, TaskStatus)> {
    let mut out: Vec<_> = derive_tasks(snapshot, config, now)
        .into_iter()
        .filter(|t| t.kind == kind)
        .map(|t| (t.id, t.status))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}
