//! Escalation ladder for late tasks.
//!
//! A reminder is identified by (task, due date, threshold). The ledger
//! records each identity once, which makes sweeps idempotent and lets a
//! rescheduled task (new due date) climb the ladder again from the bottom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

use quillflow_core::config::{EscalationAudience, EscalationStep};
use quillflow_core::error::Result;
use quillflow_core::locks::lock;

use crate::tasks::Task;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderKey {
    pub task_id: String,
    pub due: DateTime<Utc>,
    pub days_late: i64,
}

impl ReminderKey {
    pub fn new(task: &Task, days_late: i64) -> Self {
        Self {
            task_id: task.id.clone(),
            due: task.due,
            days_late,
        }
    }

    /// Flat form used as message key and database key.
    pub fn encode(&self) -> String {
        format!("late:{}:{}:{}", self.task_id, self.due.timestamp(), self.days_late)
    }
}

/// Remembers which reminders went out.
pub trait ReminderLedger: Send + Sync {
    /// Record `key`; true when it had not been recorded before.
    fn record(&self, key: &ReminderKey) -> Result<bool>;

    fn contains(&self, key: &ReminderKey) -> Result<bool>;
}

/// Ledger kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    sent: Mutex<HashSet<ReminderKey>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReminderLedger for MemoryLedger {
    fn record(&self, key: &ReminderKey) -> Result<bool> {
        Ok(lock(&self.sent).insert(key.clone()))
    }

    fn contains(&self, key: &ReminderKey) -> Result<bool> {
        Ok(lock(&self.sent).contains(key))
    }
}

/// A threshold newly crossed by a late task.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub task: Task,
    pub days_late: i64,
    pub step: EscalationStep,
}

impl Escalation {
    pub fn reaches(&self, audience: EscalationAudience) -> bool {
        self.step.audiences.contains(&audience)
    }
}

/// Check an open task against the ladder. Every crossed threshold not
/// recorded before is recorded and returned, lowest first, so a sweep that
/// jumps several rungs at once still sends each rung's notice.
pub fn escalate(
    task: &Task,
    steps: &[EscalationStep],
    ledger: &dyn ReminderLedger,
    now: DateTime<Utc>,
) -> Result<Vec<Escalation>> {
    if !task.is_open() {
        return Ok(Vec::new());
    }
    let Some(late) = task.days_late(now) else {
        return Ok(Vec::new());
    };

    let mut crossed: Vec<&EscalationStep> = steps.iter().filter(|s| s.days_late <= late).collect();
    crossed.sort_by_key(|s| s.days_late);
    let mut out = Vec::new();
    for step in crossed {
        if !ledger.record(&ReminderKey::new(task, step.days_late))? {
            continue;
        }
        tracing::debug!(
            "⏰ Task {} is {late} day(s) late, escalating at '{}'",
            task.id,
            step.wording
        );
        out.push(Escalation {
            task: task.clone(),
            days_late: late,
            step: step.clone(),
        });
    }
    Ok(out)
}
