//! Sweep engine: the periodic loop that escalates late tasks.
//! Uses tokio::interval for zero-overhead ticking (sleeps between checks).
//!
//! The loop only drives time. Whatever owns the papers implements
//! `SweepTarget`, so tests call the same entry point with a manual clock.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use quillflow_core::clock::Clock;
use quillflow_core::config::VenueConfig;
use quillflow_core::error::Result;
use quillflow_core::types::{Actor, PaperId};

use crate::escalation::{ReminderLedger, escalate};
use crate::events::{EventKind, WorkflowEvent};
use crate::tasks::{PaperSnapshot, open_tasks};

/// Outcome of one sweep over all papers.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub papers: usize,
    pub reminders: usize,
    /// Papers whose sweep failed, with the error. Other papers still ran.
    pub failures: Vec<(PaperId, String)>,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.papers += other.papers;
        self.reminders += other.reminders;
        self.failures.extend(other.failures);
    }
}

pub trait SweepTarget: Send + Sync {
    fn sweep(&self, now: DateTime<Utc>) -> SweepReport;
}

/// Escalation events for one paper's open tasks at `now`.
pub fn sweep_paper(
    snapshot: &PaperSnapshot,
    config: &VenueConfig,
    ledger: &dyn ReminderLedger,
    now: DateTime<Utc>,
) -> Result<Vec<WorkflowEvent>> {
    let reviewers = snapshot.reviewer_ids();
    let actor = Actor::venue();
    let mut events = Vec::new();
    for task in open_tasks(snapshot, config, now) {
        for e in escalate(&task, &config.escalation.steps, ledger, now)? {
            events.push(WorkflowEvent::new(
                &snapshot.paper,
                reviewers.clone(),
                &actor,
                now,
                EventKind::from_escalation(&e),
            ));
        }
    }
    Ok(events)
}

/// Spawn the sweep loop as a background tokio task.
pub fn spawn_sweeper(
    target: Arc<dyn SweepTarget>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tracing::info!("⏰ Sweeper started (check every {}s)", interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            let report = target.sweep(clock.now());
            if report.reminders > 0 {
                tracing::info!(
                    "📣 Sweep: {} reminder(s) across {} paper(s)",
                    report.reminders,
                    report.papers
                );
            }
            for (paper, err) in &report.failures {
                tracing::warn!("⚠️ Sweep of {} failed: {}", paper, err);
            }
        }
    })
}
