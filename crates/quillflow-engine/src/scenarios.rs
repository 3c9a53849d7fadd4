//! End-to-end runs through the engine: review release, recommendation
//! windows, escalation sweeps and replay.

use chrono::Duration;
use std::thread;

use quillflow_core::error::QuillflowError;
use quillflow_core::model::{AssignmentRole, Decision, NoteKind, Recommendation, TaskKind, YesNo};
use quillflow_core::traits::notifier::RecordingNotifier;
use quillflow_core::types::{Actor, PaperState};
use quillflow_lifecycle::Transition;
use quillflow_scheduler::{EventKind, SweepTarget};

use crate::testing::{REVIEWERS, Setup, author, content, editor, eic, recommendation, review};

fn reviewer(i: usize) -> Actor {
    Actor::reviewer(REVIEWERS[i])
}

fn accept() -> Decision {
    Decision {
        claims_and_evidence: YesNo::Yes,
        audience: YesNo::Yes,
        recommendation: Recommendation::AcceptAsIs,
        certifications: vec![],
        comment: "Solid work.".into(),
    }
}

fn count_for(s: &Setup, prefix: &str, person: &str) -> usize {
    s.engine
        .messages()
        .iter()
        .filter(|m| m.key.starts_with(prefix) && m.is_for(person))
        .count()
}

#[test]
fn test_third_review_starts_discussion() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 3);

    for i in 0..2 {
        s.engine.submit_review(&paper.id, &reviewer(i), review()).unwrap();
    }
    let notes = s.engine.store().notes_for(&paper.id).unwrap();
    assert!(notes.iter().filter(|n| n.kind == NoteKind::Review).all(|n| !n.is_public()));
    assert!(!s.keys().iter().any(|k| k.starts_with("discussion_started:")));

    s.engine.submit_review(&paper.id, &reviewer(2), review()).unwrap();
    let notes = s.engine.store().notes_for(&paper.id).unwrap();
    let reviews: Vec<_> = notes.iter().filter(|n| n.kind == NoteKind::Review).collect();
    assert_eq!(reviews.len(), 3);
    assert!(reviews.iter().all(|n| n.is_public()));

    let prefix = format!("discussion_started:{}:", paper.id);
    assert_eq!(count_for(&s, &prefix, "~Ada_Author1"), 1);
    assert_eq!(count_for(&s, &prefix, "~Alan_Editor1"), 1);
    for person in &REVIEWERS[..3] {
        assert_eq!(count_for(&s, &prefix, person), 1);
    }

    // all three reviewed, so the recommendation window is set
    let windows = s.engine.store().windows_for(&paper.id).unwrap();
    assert!(windows.iter().any(|w| w.kind == TaskKind::OfficialRecommendation));

    // a later sweep does not announce the discussion again
    s.clock.advance_days(1);
    s.engine.sweep_now();
    assert_eq!(count_for(&s, &prefix, "~Ada_Author1"), 1);
}

#[test]
fn test_fourth_reviewer_triggers_too_many_notice() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 4);
    for i in 0..4 {
        s.engine.submit_review(&paper.id, &reviewer(i), review()).unwrap();
    }

    let early = s
        .engine
        .submit_recommendation(&paper.id, &reviewer(0), recommendation("Accept as is"))
        .unwrap_err();
    assert!(matches!(early, QuillflowError::InvalidTransition(_)));

    s.clock.advance_days(s.engine.config().periods.discussion);
    for i in 0..3 {
        s.engine
            .submit_recommendation(&paper.id, &reviewer(i), recommendation("Accept as is"))
            .unwrap();
    }

    let events = s.engine.events();
    let missing = events.iter().find_map(|e| match &e.kind {
        EventKind::TooManyReviewers { missing } => Some(missing.clone()),
        _ => None,
    });
    assert_eq!(missing, Some(vec!["~Remy_Reviewer1".to_string()]));
    assert!(!events.iter().any(|e| matches!(e.kind, EventKind::AllRecommendationsIn { .. })));
    assert_eq!(count_for(&s, "too_many_reviewers:", "~Alan_Editor1"), 1);

    // the last reviewer completes the set
    s.engine
        .submit_recommendation(&paper.id, &reviewer(3), recommendation("Reject"))
        .unwrap();
    assert!(s
        .engine
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::AllRecommendationsIn { .. })));
}

#[test]
fn test_removing_last_pending_reviewer_opens_recommendations() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 4);
    for i in 0..3 {
        s.engine.submit_review(&paper.id, &reviewer(i), review()).unwrap();
    }
    let has_window = |s: &Setup| {
        s.engine
            .store()
            .windows_for(&paper.id)
            .unwrap()
            .iter()
            .any(|w| w.kind == TaskKind::OfficialRecommendation)
    };
    assert!(!has_window(&s));

    let remy = s
        .engine
        .store()
        .edges_for(&paper.id)
        .unwrap()
        .into_iter()
        .find(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer) && e.tail == REVIEWERS[3])
        .unwrap();
    s.engine.unassign(&remy.id, &editor()).unwrap();
    assert!(has_window(&s));
    assert!(s
        .engine
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::TaskScheduled { task: TaskKind::OfficialRecommendation, .. })));

    s.clock.advance_days(s.engine.config().periods.discussion);
    for i in 0..3 {
        s.engine
            .submit_recommendation(&paper.id, &reviewer(i), recommendation("Accept as is"))
            .unwrap();
    }
    assert!(s
        .engine
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::AllRecommendationsIn { .. })));
}

#[test]
fn test_recommendation_edit_keeps_one_note() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 3);
    for i in 0..3 {
        s.engine.submit_review(&paper.id, &reviewer(i), review()).unwrap();
    }
    s.clock.advance_days(s.engine.config().periods.discussion);

    let first = s
        .engine
        .submit_recommendation(&paper.id, &reviewer(0), recommendation("Reject"))
        .unwrap();
    let second = s
        .engine
        .submit_recommendation(&paper.id, &reviewer(0), recommendation("Accept as is"))
        .unwrap();
    assert_eq!(first.id, second.id);

    let bogus = s
        .engine
        .submit_recommendation(&paper.id, &reviewer(1), recommendation("Maybe"));
    assert!(bogus.is_err());

    let notes = s.engine.store().notes_for(&paper.id).unwrap();
    assert_eq!(notes.iter().filter(|n| n.kind == NoteKind::Recommendation).count(), 1);
}

#[test]
fn test_terminal_papers_never_remind() {
    let s = Setup::new();
    let withdrawn = s.with_reviewers("Withdrawn Paper", 1);
    let control = s.under_editor("Control Paper");
    let start = s.engine.now();

    s.engine
        .apply_transition(&withdrawn.id, Transition::Withdraw, &author())
        .unwrap();
    assert!(s
        .engine
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::TasksExpired { .. })));

    for days in [1, 8, 15, 31, 60, 120] {
        let report = s.engine.sweep(start + Duration::days(days));
        assert!(report.failures.is_empty());
    }

    let late: Vec<_> = s
        .engine
        .events()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::TaskLate { .. }))
        .collect();
    assert!(!late.is_empty());
    assert!(late.iter().all(|e| e.paper.id == control.id));
    assert!(s.engine.open_tasks_for(&withdrawn.id).unwrap().is_empty());
}

#[test]
fn test_sweep_reminders_are_sent_once() {
    let s = Setup::new();
    s.under_editor("Sparse Attention");

    s.clock.advance_days(8);
    let first = s.engine.sweep_now();
    assert!(first.reminders > 0);
    let again = s.engine.sweep_now();
    assert_eq!(again.reminders, 0);

    // the next escalation step only fires once it is reached
    s.clock.advance_days(7);
    let later = s.engine.sweep_now();
    assert!(later.reminders > 0);
    let late_keys = s.keys().iter().filter(|k| k.starts_with("late:")).count();
    assert!(late_keys >= 2);
}

#[test]
fn test_late_sweep_sends_every_skipped_step() {
    let s = Setup::new();
    let paper = s.under_editor("Sparse Attention");
    let review_approval_due = s.engine.now() + Duration::days(s.engine.config().periods.review_approval);

    // first sweep only after the approval is nearly two weeks late
    let at = review_approval_due + Duration::days(13);
    s.engine.sweep(at);
    let thresholds: Vec<i64> = s
        .engine
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::TaskLate { task, threshold, .. }
                if task.kind == TaskKind::ReviewApproval && task.paper_id == paper.id =>
            {
                Some(*threshold)
            }
            _ => None,
        })
        .collect();
    assert_eq!(thresholds, vec![0, 5, 7]);
    // the editor hears about each step, the chiefs from one week on
    assert!(count_for(&s, "late:", "~Alan_Editor1") >= 3);
    assert_eq!(count_for(&s, "late:", "~Eve_Chief1"), 1);
}

#[test]
fn test_full_lifecycle_replays_consistently() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 3);
    for i in 0..3 {
        s.engine.submit_review(&paper.id, &reviewer(i), review()).unwrap();
    }
    s.clock.advance_days(s.engine.config().periods.discussion);
    for i in 0..3 {
        s.engine
            .submit_recommendation(&paper.id, &reviewer(i), recommendation("Accept as is"))
            .unwrap();
    }

    s.engine
        .apply_transition(&paper.id, Transition::Decide { decision: accept() }, &editor())
        .unwrap();
    let accepted = s
        .engine
        .apply_transition(
            &paper.id,
            Transition::DecisionApproval {
                approve: true,
                certifications: None,
            },
            &eic(),
        )
        .unwrap();
    assert_eq!(accepted.state, PaperState::Accepted);

    s.engine
        .apply_transition(
            &paper.id,
            Transition::CameraReady {
                content: content("Sparse Attention, Final"),
            },
            &author(),
        )
        .unwrap();
    let verified = s
        .engine
        .apply_transition(&paper.id, Transition::VerifyCameraReady, &editor())
        .unwrap();
    assert!(verified.camera_ready.verified_at.is_some());

    let report = s.engine.replay(&paper.id).unwrap();
    assert!(report.consistent);
    assert_eq!(report.rebuilt.state, PaperState::Accepted);
    assert_eq!(report.rebuilt.assigned_action_editor.as_deref(), Some("~Alan_Editor1"));
}

#[test]
fn test_replay_after_editor_replacement() {
    let s = Setup::new();
    let paper = s.under_editor("Sparse Attention");
    s.engine
        .replace_action_editor(&paper.id, "~Bea_Editor1", &eic())
        .unwrap();
    let report = s.engine.replay(&paper.id).unwrap();
    assert!(report.consistent);
    assert_eq!(report.stored.assigned_action_editor.as_deref(), Some("~Bea_Editor1"));
}

#[test]
fn test_racing_action_editor_assignments() {
    let s = Setup::new();
    let paper = s.submit("Sparse Attention");

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["~Alan_Editor1", "~Bea_Editor1"]
            .into_iter()
            .map(|person| {
                let engine = &s.engine;
                let id = &paper.id;
                scope.spawn(move || engine.assign(id, person, AssignmentRole::ActionEditor, &eic()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(QuillflowError::DuplicateAssignment(_)))));
}

#[test]
fn test_racing_reviewer_assignments_respect_quota() {
    let s = Setup::new();
    let first = s.under_review("First");
    let second = s.under_review("Second");

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = [&first.id, &second.id]
            .into_iter()
            .map(|id| {
                let engine = &s.engine;
                scope.spawn(move || engine.assign(id, "~Rita_Reviewer1", AssignmentRole::Reviewer, &editor()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(QuillflowError::QuotaExceeded(_)))));
    assert_eq!(s.engine.pending_reviews("~Rita_Reviewer1").unwrap(), 1);
}

#[test]
fn test_pending_review_counter_tracks_assignments() {
    let s = Setup::with_config(|c| c.reviewing.max_pending_reviews = 3);
    let papers: Vec<_> = ["One", "Two", "Three", "Four"]
        .iter()
        .map(|t| s.under_review(t))
        .collect();
    let rita = "~Rita_Reviewer1";

    let mut edges = Vec::new();
    for paper in &papers[..3] {
        edges.push(
            s.engine
                .assign(&paper.id, rita, AssignmentRole::Reviewer, &editor())
                .unwrap(),
        );
    }
    assert_eq!(s.engine.pending_reviews(rita).unwrap(), 3);
    let over = s
        .engine
        .assign(&papers[3].id, rita, AssignmentRole::Reviewer, &editor())
        .unwrap_err();
    assert!(matches!(over, QuillflowError::QuotaExceeded(_)));

    s.engine
        .submit_review(&papers[0].id, &Actor::reviewer(rita), review())
        .unwrap();
    assert_eq!(s.engine.pending_reviews(rita).unwrap(), 2);

    s.engine
        .apply_transition(&papers[1].id, Transition::Withdraw, &author())
        .unwrap();
    assert_eq!(s.engine.pending_reviews(rita).unwrap(), 1);

    s.engine.unassign(&edges[2].id, &editor()).unwrap();
    assert_eq!(s.engine.pending_reviews(rita).unwrap(), 0);
}

#[test]
fn test_schedule_task_is_for_chiefs() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 3);
    let now = s.engine.now();
    let due = now + Duration::days(14);

    let err = s
        .engine
        .schedule_task(&paper.id, TaskKind::OfficialRecommendation, now, due, &editor())
        .unwrap_err();
    assert!(matches!(err, QuillflowError::NotInvitee(_)));

    let backwards = s
        .engine
        .schedule_task(&paper.id, TaskKind::OfficialRecommendation, due, now, &eic());
    assert!(backwards.is_err());

    s.engine
        .schedule_task(&paper.id, TaskKind::OfficialRecommendation, now, due, &eic())
        .unwrap();
    let open_notices = || {
        s.keys()
            .iter()
            .filter(|k| k.starts_with("task_scheduled:"))
            .count()
    };
    assert_eq!(open_notices(), 1);
    assert!(count_for(&s, "task_scheduled:", "~Rita_Reviewer1") == 1);

    // same window again: no status moves, no second notice
    s.engine
        .schedule_task(&paper.id, TaskKind::OfficialRecommendation, now, due, &eic())
        .unwrap();
    assert_eq!(open_notices(), 1);
}

#[test]
fn test_acknowledgement_is_single() {
    let s = Setup::new();
    let paper = s.with_reviewers("Sparse Attention", 1);
    s.engine.acknowledge_assignment(&paper.id, &reviewer(0)).unwrap();
    let again = s.engine.acknowledge_assignment(&paper.id, &reviewer(0)).unwrap_err();
    assert!(matches!(again, QuillflowError::InvalidTransition(_)));

    let stranger = s.engine.acknowledge_assignment(&paper.id, &reviewer(1)).unwrap_err();
    assert!(matches!(stranger, QuillflowError::NotInvitee(_)));
}

#[tokio::test]
async fn test_flush_delivers_queued_messages() {
    let s = Setup::new();
    s.under_editor("Sparse Attention");
    let notifier = RecordingNotifier::new();

    let stats = s.engine.flush(&notifier).await;
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.sent, notifier.sent().len());
    assert!(notifier.sent().iter().any(|m| m.key.starts_with("submitted:") && m.is_for("~Ada_Author1")));

    let second = s.engine.flush(&notifier).await;
    assert_eq!(second.sent, 0);
}
