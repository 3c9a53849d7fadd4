//! Engine: serializes edits per paper and turns accepted edits into events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use quillflow_assign::{Assigner, pending_reviews};
use quillflow_core::clock::Clock;
use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::groups::GroupIds;
use quillflow_core::locks::{KeyedLocks, lock};
use quillflow_core::message::Message;
use quillflow_core::model::{
    AssignmentRole, Content, Edge, EdgeKind, Edit, EditKind, Entity, Group, InviteLabel, NoteKind, Paper,
    PendingKind, TaskKind, TaskWindow,
};
use quillflow_core::traits::{Batch, IdentityOracle, Notifier, RecordStore};
use quillflow_core::types::{Actor, EdgeId, PaperId};
use quillflow_lifecycle::replay::NUMBER_KEY;
use quillflow_lifecycle::visibility::editorial_readers;
use quillflow_lifecycle::{Outcome, Transition, apply, same_lifecycle, submit};
use quillflow_scheduler::{
    ApprovalSubject, DispatchStats, EventKind, MemoryLedger, NotifyRouter, PaperSnapshot, PolicyContext,
    ReminderLedger, SweepReport, SweepTarget, Task, WorkflowEvent, derive_tasks, dispatch_pending,
    events_to_messages, open_tasks, sweep_paper,
};

/// Recent events kept for inspection.
const EVENT_LOG_LIMIT: usize = 500;

/// Result of rebuilding a paper from its edit history.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub rebuilt: Paper,
    pub stored: Paper,
    pub consistent: bool,
}

pub struct Engine {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) oracle: Arc<dyn IdentityOracle>,
    pub(crate) config: Arc<VenueConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: GroupIds,
    paper_locks: KeyedLocks,
    reviewer_locks: KeyedLocks,
    /// Held while a paper number is taken and the paper written.
    numbering: Mutex<()>,
    ledger: Arc<dyn ReminderLedger>,
    outbox: Arc<Mutex<NotifyRouter>>,
    events: Mutex<VecDeque<WorkflowEvent>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        oracle: Arc<dyn IdentityOracle>,
        config: Arc<VenueConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ids = GroupIds::new(&config.venue_id);
        tracing::info!("🛠️ Engine for {} on {} store", config.short_name, store.name());
        Self {
            store,
            oracle,
            config,
            clock,
            ids,
            paper_locks: KeyedLocks::new(),
            reviewer_locks: KeyedLocks::new(),
            numbering: Mutex::new(()),
            ledger: Arc::new(MemoryLedger::new()),
            outbox: Arc::new(Mutex::new(NotifyRouter::new())),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Use a durable reminder ledger instead of the in-memory one.
    pub fn with_ledger(mut self, ledger: Arc<dyn ReminderLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn config(&self) -> &VenueConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Shared outbox, drained by the dispatcher.
    pub fn outbox(&self) -> Arc<Mutex<NotifyRouter>> {
        self.outbox.clone()
    }

    /// Queued and delivered messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.outbox).messages().into_iter().cloned().collect()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        lock(&self.events).iter().cloned().collect()
    }

    pub fn take_events(&self) -> Vec<WorkflowEvent> {
        lock(&self.events).drain(..).collect()
    }

    /// Deliver everything queued through `notifier` once.
    pub async fn flush(&self, notifier: &dyn Notifier) -> DispatchStats {
        dispatch_pending(&self.outbox, notifier, None).await
    }

    pub fn paper(&self, paper_id: &PaperId) -> Result<Paper> {
        self.store.paper(paper_id)
    }

    pub(crate) fn assigner(&self) -> Assigner<'_> {
        Assigner::new(self.store.as_ref(), self.oracle.as_ref(), &self.config)
    }

    pub(crate) fn paper_slot(&self, paper_id: &PaperId) -> Arc<Mutex<()>> {
        self.paper_locks.slot(paper_id.as_str())
    }

    pub(crate) fn reviewer_slot(&self, person: &str) -> Arc<Mutex<()>> {
        self.reviewer_locks.slot(person)
    }

    pub(crate) fn active_reviewers(&self, paper_id: &PaperId) -> Result<Vec<String>> {
        Ok(self
            .store
            .edges_for(paper_id)?
            .into_iter()
            .filter(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer))
            .map(|e| e.tail)
            .collect())
    }

    // ─── Events ───────────────────────────────────────────────

    /// Turn events into messages and queue them. Never fails the caller.
    pub(crate) fn publish(&self, events: Vec<WorkflowEvent>) {
        for event in events {
            let ae_email = event
                .paper
                .assigned_action_editor
                .as_deref()
                .and_then(|ae| self.oracle.preferred_email(ae));
            let ctx = PolicyContext::new(&self.config).with_action_editor_email(ae_email);
            let queued = lock(&self.outbox).enqueue_all(events_to_messages(&event, &ctx));
            tracing::debug!(
                "📬 {} on paper {} queued {} message(s)",
                event.name(),
                event.paper.number,
                queued
            );
            let mut log = lock(&self.events);
            log.push_back(event);
            while log.len() > EVENT_LOG_LIMIT {
                log.pop_front();
            }
        }
    }

    /// Publish `kinds` against the paper as stored after the edit.
    pub(crate) fn announce(&self, paper: &Paper, actor: &Actor, at: DateTime<Utc>, kinds: Vec<EventKind>) {
        if kinds.is_empty() {
            return;
        }
        let reviewers = self.active_reviewers(&paper.id).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Could not list reviewers of paper {}: {e}", paper.number);
            Vec::new()
        });
        let events = kinds
            .into_iter()
            .map(|kind| WorkflowEvent::new(paper, reviewers.clone(), actor, at, kind))
            .collect();
        self.publish(events);
    }

    /// Re-read the paper after a commit, falling back to the planned copy.
    pub(crate) fn stored(&self, planned: Paper) -> Paper {
        self.store.paper(&planned.id).unwrap_or(planned)
    }

    // ─── Lifecycle ────────────────────────────────────────────

    /// Create a paper from its first submission.
    pub fn submit(&self, content: Content, actor: &Actor) -> Result<Paper> {
        let at = self.clock.now();
        let numbering = lock(&self.numbering);
        let number = self.store.next_paper_number()?;
        let paper = submit(PaperId::generate(), number, content.clone(), actor, at, &self.config)?;

        let mut payload = Transition::Submit { content }.to_payload();
        payload[NUMBER_KEY] = json!(number);
        let authors = Group {
            id: self.ids.authors(number),
            paper_id: Some(paper.id.clone()),
            members: paper.author_ids().into_iter().collect(),
            readers: editorial_readers(number, &self.ids),
            anonymous: None,
            cdate: at,
            version: 0,
        };
        let mut batch = Batch::new();
        batch
            .put(Entity::Paper(paper.clone()))
            .record(Edit::new(paper.id.as_str(), EditKind::Transition, actor, payload, at));
        batch.put(Entity::Group(authors.clone())).record(Edit::new(
            authors.id.as_str(),
            EditKind::Group,
            actor,
            json!({ "members": authors.members }),
            at,
        ));
        self.store.commit(batch)?;
        drop(numbering);

        tracing::info!("📄 Paper {} submitted: {}", number, paper.title());
        let paper = self.stored(paper);
        self.announce(&paper, actor, at, vec![EventKind::Submitted]);
        Ok(paper)
    }

    /// Validate and execute a lifecycle transition.
    ///
    /// A transition that takes the paper out of the active pool closes its
    /// open invitations in the same batch and reports the review-phase
    /// tasks it cut short.
    pub fn apply_transition(&self, paper_id: &PaperId, transition: Transition, actor: &Actor) -> Result<Paper> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();

        let before = PaperSnapshot::load(self.store.as_ref(), paper_id)?;
        let outcome = apply(&before.paper, &transition, actor, at, &self.config)?;

        let mut batch = Batch::new();
        batch.put(Entity::Paper(outcome.paper.clone())).record(Edit::new(
            paper_id.as_str(),
            EditKind::Transition,
            actor,
            transition.to_payload(),
            at,
        ));

        let mut expired = Vec::new();
        if outcome.left_active_pool() {
            let mut after = before.clone();
            after.paper = outcome.paper.clone();
            let still_open: BTreeSet<String> = open_tasks(&after, &self.config, at).into_iter().map(|t| t.id).collect();
            expired = open_tasks(&before, &self.config, at)
                .into_iter()
                .map(|t| t.id)
                .filter(|id| !still_open.contains(id))
                .collect();
            for invite in close_invitations(&before.edges, at) {
                batch.put(Entity::Edge(invite.clone())).record(Edit::new(
                    invite.id.as_str(),
                    EditKind::Invitation,
                    actor,
                    serde_json::to_value(&invite)?,
                    at,
                ));
            }
        }
        self.store.commit(batch)?;

        tracing::info!(
            "🔀 Paper {} {}: {} → {}",
            before.paper.number,
            transition.name(),
            outcome.previous,
            outcome.paper.state
        );
        if !expired.is_empty() {
            tracing::info!("⌛ Paper {} left the pool, {} task(s) expired", before.paper.number, expired.len());
        }

        let kinds = transition_events(&before.paper, &outcome, &transition, expired);
        let paper = self.stored(outcome.paper);
        self.announce(&paper, actor, at, kinds);
        Ok(paper)
    }

    // ─── Assignment ───────────────────────────────────────────

    /// Assign an action editor or reviewer.
    pub fn assign(&self, paper_id: &PaperId, person: &str, role: AssignmentRole, actor: &Actor) -> Result<Edge> {
        let slot = self.paper_slot(paper_id);
        let _paper = lock(&slot);
        let assigner = self.assigner();
        let canonical = assigner.canonical(person);
        let reviewer_slot = (role == AssignmentRole::Reviewer).then(|| self.reviewer_slot(&canonical));
        let _reviewer = reviewer_slot.as_deref().map(lock);

        let at = self.clock.now();
        let plan = assigner.plan_assign(paper_id, person, role, actor, at)?;
        self.store.commit(plan.batch)?;
        tracing::info!("👤 {} {} assigned to paper {}", role, plan.edge.tail, plan.paper.number);

        let kind = EventKind::Assigned {
            role,
            person: plan.edge.tail.clone(),
            anon_id: plan.anon_group.id.clone(),
        };
        let paper = self.stored(plan.paper);
        self.announce(&paper, actor, at, vec![kind]);
        Ok(plan.edge)
    }

    /// Swap the action editor in one edit.
    pub fn replace_action_editor(&self, paper_id: &PaperId, person: &str, actor: &Actor) -> Result<Edge> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let at = self.clock.now();
        let plan = self.assigner().plan_replace_action_editor(paper_id, person, actor, at)?;
        self.store.commit(plan.batch)?;
        tracing::info!("👤 Action editor of paper {} is now {}", plan.paper.number, plan.edge.tail);

        let mut kinds = Vec::new();
        if let Some(old) = &plan.replaced {
            kinds.push(EventKind::Unassigned {
                role: AssignmentRole::ActionEditor,
                person: old.tail.clone(),
                had_review: false,
            });
        }
        kinds.push(EventKind::Assigned {
            role: AssignmentRole::ActionEditor,
            person: plan.edge.tail.clone(),
            anon_id: plan.anon_group.id.clone(),
        });
        let paper = self.stored(plan.paper);
        self.announce(&paper, actor, at, kinds);
        Ok(plan.edge)
    }

    /// Remove an assignment edge.
    pub fn unassign(&self, edge_id: &EdgeId, actor: &Actor) -> Result<Edge> {
        let edge = match self.store.get_entity(edge_id.as_str())? {
            Some(Entity::Edge(e)) => e,
            _ => return Err(QuillflowError::not_found(format!("edge {edge_id}"))),
        };
        let slot = self.paper_slot(&edge.paper_id);
        let _paper = lock(&slot);
        let reviewer_slot = edge
            .is_assignment(AssignmentRole::Reviewer)
            .then(|| self.reviewer_slot(&edge.tail));
        let _reviewer = reviewer_slot.as_deref().map(lock);

        let at = self.clock.now();
        let mut plan = self.assigner().plan_unassign(edge_id, actor, at)?;
        // Dropping the last reviewer without a review may leave everyone
        // else done; the window then opens with the removal.
        let scheduled = if plan.edge.is_assignment(AssignmentRole::Reviewer) {
            self.recommendation_window_after_removal(&plan.paper, &plan.edge.tail, actor, &mut plan.batch, at)?
        } else {
            None
        };
        self.store.commit(plan.batch)?;
        let role = match plan.edge.kind {
            EdgeKind::Assignment(role) | EdgeKind::Invite(role) => role,
        };
        tracing::info!("👋 {} {} removed from paper {}", role, plan.edge.tail, plan.paper.number);

        let mut kinds = vec![EventKind::Unassigned {
            role,
            person: plan.edge.tail.clone(),
            had_review: plan.had_review,
        }];
        if let Some(w) = scheduled {
            kinds.push(EventKind::TaskScheduled {
                task: w.kind,
                cdate: w.cdate,
                duedate: w.duedate,
                status_changed: false,
            });
        }
        let paper = self.stored(plan.paper);
        self.announce(&paper, actor, at, kinds);
        Ok(plan.edge)
    }

    fn recommendation_window_after_removal(
        &self,
        paper: &Paper,
        removed: &str,
        actor: &Actor,
        batch: &mut Batch,
        at: DateTime<Utc>,
    ) -> Result<Option<TaskWindow>> {
        let has_window = self
            .store
            .windows_for(&paper.id)?
            .iter()
            .any(|w| w.kind == TaskKind::OfficialRecommendation);
        if has_window {
            return Ok(None);
        }
        let reviews: Vec<String> = self
            .store
            .notes_for(&paper.id)?
            .into_iter()
            .filter(|n| n.kind == NoteKind::Review)
            .map(|n| n.signature)
            .collect();
        let reviewed: Vec<&str> = reviews.iter().map(String::as_str).collect();
        let active: Vec<String> = self
            .active_reviewers(&paper.id)?
            .into_iter()
            .filter(|r| r != removed)
            .collect();
        self.plan_recommendation_window(paper, &reviewed, &active, actor, batch, at)
    }

    /// Active, unsubmitted review assignments of `reviewer` on papers in
    /// the active pool.
    pub fn pending_reviews(&self, reviewer: &str) -> Result<u32> {
        let person = self.assigner().canonical(reviewer);
        let slot = self.reviewer_slot(&person);
        let _guard = lock(&slot);
        pending_reviews(self.store.as_ref(), &person)
    }

    // ─── Tasks and replay ─────────────────────────────────────

    /// Every derived task of the paper at the engine's current time.
    pub fn tasks(&self, paper_id: &PaperId) -> Result<Vec<Task>> {
        let snapshot = PaperSnapshot::load(self.store.as_ref(), paper_id)?;
        Ok(derive_tasks(&snapshot, &self.config, self.clock.now()))
    }

    pub fn open_tasks_for(&self, paper_id: &PaperId) -> Result<Vec<Task>> {
        let snapshot = PaperSnapshot::load(self.store.as_ref(), paper_id)?;
        Ok(open_tasks(&snapshot, &self.config, self.clock.now()))
    }

    /// Fold the paper's edit history and compare with the stored paper.
    pub fn replay(&self, paper_id: &PaperId) -> Result<ReplayReport> {
        let slot = self.paper_slot(paper_id);
        let _guard = lock(&slot);
        let stored = self.store.paper(paper_id)?;
        let edits = self.store.edit_history(paper_id.as_str())?;
        let rebuilt = quillflow_lifecycle::replay(&edits, &self.config)?;
        let consistent = same_lifecycle(&rebuilt, &stored);
        if !consistent {
            tracing::warn!("⚠️ Replay of paper {} diverges from the stored paper", stored.number);
        }
        Ok(ReplayReport {
            rebuilt,
            stored,
            consistent,
        })
    }

    /// One sweep at the clock's current time.
    pub fn sweep_now(&self) -> SweepReport {
        self.sweep(self.clock.now())
    }
}

impl SweepTarget for Engine {
    fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        report.failures = self.complete_sign_ups(now).failures;

        let papers = match self.store.papers() {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!("⚠️ Sweep could not list papers: {e}");
                return report;
            }
        };
        let mut finished = BTreeSet::new();
        for paper in papers {
            if paper.state.is_terminal() {
                finished.insert(paper.id.to_string());
            }
            let slot = self.paper_slot(&paper.id);
            let _guard = lock(&slot);
            report.papers += 1;
            let swept = PaperSnapshot::load(self.store.as_ref(), &paper.id)
                .and_then(|snapshot| sweep_paper(&snapshot, &self.config, self.ledger.as_ref(), now));
            match swept {
                Ok(events) => {
                    report.reminders += events.len();
                    self.publish(events);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Sweep of paper {} failed: {e}", paper.number);
                    report.failures.push((paper.id.clone(), e.to_string()));
                }
            }
        }
        let pruned = self.paper_locks.prune(|key| !finished.contains(key));
        if pruned > 0 {
            tracing::debug!("🧹 Dropped {pruned} lock slot(s) of finished papers");
        }
        report
    }
}

fn approval_subject(kind: &PendingKind) -> ApprovalSubject {
    match kind {
        PendingKind::DeskRejection { .. } => ApprovalSubject::DeskRejection,
        PendingKind::Decision(_) => ApprovalSubject::Decision,
        PendingKind::Retraction { .. } => ApprovalSubject::Retraction,
    }
}

/// Open invitation edges, closed at `at`.
fn close_invitations(edges: &[Edge], at: DateTime<Utc>) -> Vec<Edge> {
    edges
        .iter()
        .filter(|e| {
            e.is_invite()
                && e.is_active()
                && matches!(e.label, Some(InviteLabel::InvitationSent | InviteLabel::PendingSignUp))
        })
        .map(|e| {
            let mut closed = e.clone();
            closed.deletion_time = Some(at);
            closed
        })
        .collect()
}

fn transition_events(before: &Paper, outcome: &Outcome, transition: &Transition, expired: Vec<String>) -> Vec<EventKind> {
    let after = &outcome.paper;
    let mut kinds = Vec::new();

    if matches!(transition, Transition::Revise { .. }) {
        kinds.push(EventKind::Revised);
    }
    if before.pending.is_none() {
        if let Some(pending) = &after.pending {
            kinds.push(EventKind::ApprovalRequested {
                subject: approval_subject(&pending.kind),
            });
        }
    }
    let declined = matches!(
        transition,
        Transition::DeskRejectionApproval { approve: false }
            | Transition::DecisionApproval { approve: false, .. }
            | Transition::RetractionApproval { approve: false }
    );
    if declined {
        if let Some(pending) = &before.pending {
            kinds.push(EventKind::ApprovalDeclined {
                subject: approval_subject(&pending.kind),
                requested_by: pending.requested_by.clone(),
            });
        }
    }
    if outcome.state_changed() {
        kinds.push(EventKind::StateChanged {
            previous: outcome.previous,
        });
    }
    match transition {
        Transition::CameraReady { .. } => kinds.push(EventKind::CameraReadySubmitted),
        Transition::VerifyCameraReady => kinds.push(EventKind::CameraReadyVerified),
        _ => {}
    }
    if !expired.is_empty() {
        kinds.push(EventKind::TasksExpired { tasks: expired });
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Setup, eic};
    use quillflow_core::types::{PaperState, Role};
    use quillflow_lifecycle::ReviewVerdict;

    #[test]
    fn test_submit_numbers_papers() {
        let s = Setup::new();
        let a = s.submit("Sparse Attention");
        let b = s.submit("Dense Retrieval");
        assert_eq!(a.number, 1);
        assert_eq!(b.number, 2);
        assert_eq!(a.state, PaperState::Submitted);
        let authors = s.engine.store().group(&s.engine.ids.authors(1)).unwrap().unwrap();
        assert!(authors.members.contains("~Ada_Author1"));
        assert!(s.keys().iter().any(|k| k.starts_with("submitted:") && k.ends_with(":chiefs")));
    }

    #[test]
    fn test_rejected_edit_changes_nothing() {
        let s = Setup::new();
        let paper = s.submit("Sparse Attention");
        let before = s.engine.events().len();
        let err = s
            .engine
            .apply_transition(
                &paper.id,
                Transition::ReviewApproval {
                    verdict: ReviewVerdict::AppropriateForReview,
                },
                &Actor::reviewer("~Rita_Reviewer1"),
            )
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(s.engine.paper(&paper.id).unwrap().state, PaperState::Submitted);
        assert_eq!(s.engine.events().len(), before);
    }

    #[test]
    fn test_desk_rejection_requests_approval() {
        let s = Setup::new();
        let paper = s.under_editor("Sparse Attention");
        let ae = Actor::action_editor("~Alan_Editor1");
        let paper = s
            .engine
            .apply_transition(
                &paper.id,
                Transition::ReviewApproval {
                    verdict: ReviewVerdict::DeskReject {
                        comment: "Out of scope".into(),
                    },
                },
                &ae,
            )
            .unwrap();
        assert_eq!(paper.state, PaperState::Submitted);
        assert!(paper.pending.is_some());
        let approval = s.engine.events().into_iter().last().unwrap();
        assert!(matches!(
            approval.kind,
            EventKind::ApprovalRequested {
                subject: ApprovalSubject::DeskRejection
            }
        ));

        let paper = s
            .engine
            .apply_transition(&paper.id, Transition::DeskRejectionApproval { approve: true }, &eic())
            .unwrap();
        assert_eq!(paper.state, PaperState::DeskRejected);
        assert!(s
            .engine
            .events()
            .iter()
            .any(|e| matches!(e.kind, EventKind::TasksExpired { .. })));
    }

    #[test]
    fn test_withdrawal_closes_invitations() {
        let s = Setup::new();
        let paper = s.under_review("Sparse Attention");
        s.engine
            .invite_external(&paper.id, "guest@uni.edu", AssignmentRole::Reviewer, &eic())
            .unwrap();
        s.engine
            .apply_transition(&paper.id, Transition::Withdraw, &Actor::author("~Ada_Author1"))
            .unwrap();
        let open = s
            .engine
            .store()
            .edges_for(&paper.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.is_invite() && e.is_active())
            .count();
        assert_eq!(open, 0);
    }

    #[test]
    fn test_sweep_drops_lock_slots_of_finished_papers() {
        let s = Setup::new();
        let open = s.under_review("Sparse Attention");
        let gone = s.under_review("Dense Attention");
        s.engine
            .apply_transition(&gone.id, Transition::Withdraw, &Actor::author("~Ada_Author1"))
            .unwrap();

        s.engine.sweep_now();
        let slots = &s.engine.paper_locks;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.prune(|key| key == open.id.as_str()), 0);
    }

    #[test]
    fn test_replace_action_editor_announces_both() {
        let s = Setup::new();
        let paper = s.under_editor("Sparse Attention");
        s.engine.take_events();
        s.engine.replace_action_editor(&paper.id, "~Bea_Editor1", &eic()).unwrap();
        let kinds: Vec<_> = s.engine.events().into_iter().map(|e| e.kind).collect();
        assert!(matches!(&kinds[0], EventKind::Unassigned { person, .. } if person == "~Alan_Editor1"));
        assert!(matches!(&kinds[1], EventKind::Assigned { person, .. } if person == "~Bea_Editor1"));
        assert_eq!(
            s.engine.paper(&paper.id).unwrap().assigned_action_editor.as_deref(),
            Some("~Bea_Editor1")
        );
    }

    #[test]
    fn test_action_editor_replies_route_to_editor() {
        let s = Setup::new();
        let paper = s.under_review("Sparse Attention");
        s.engine
            .assign(
                &paper.id,
                "~Rita_Reviewer1",
                AssignmentRole::Reviewer,
                &Actor::new("~Alan_Editor1", Role::ActionEditor),
            )
            .unwrap();
        let assigned = s
            .engine
            .messages()
            .into_iter()
            .find(|m| m.key.starts_with("assigned:") && m.is_for("~Rita_Reviewer1"))
            .unwrap();
        assert_eq!(assigned.reply_to.as_deref(), Some("alan@lab.org"));
    }

    #[test]
    fn test_unassign_unknown_edge() {
        let s = Setup::new();
        let err = s.engine.unassign(&EdgeId("nope".into()), &eic()).unwrap_err();
        assert!(matches!(err, QuillflowError::NotFound(_)));
    }
}
