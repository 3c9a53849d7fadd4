//! # Quillflow Scheduler
//!
//! Derived tasks, escalating reminders and the notification pipeline.
//!
//! ## Design Principles
//! - Tasks are recomputed from records, never stored
//! - SQLite ledger: reminders survive restarts and are sent once
//! - Tokio timers only, idle when there is nothing to do
//! - Policy is a pure function; delivery is best effort
//!
//! ## Architecture
//! ```text
//! Sweeper (tokio interval)
//!   └── per paper: open tasks → escalation ladder → TaskLate events
//!
//! Engine edits ──► WorkflowEvent ──► policy ──► Message
//!                                                 │
//!                                      NotifyRouter (outbox)
//!                                                 │
//!                                 Dispatcher (tokio interval)
//!                                   ├── Log
//!                                   ├── Webhook (HTTP POST)
//!                                   └── SMTP (lettre)
//! ```

pub mod dispatch;
pub mod engine;
pub mod escalation;
pub mod events;
pub mod notify;
pub mod persistence;
pub mod policy;
pub mod tasks;
pub mod templates;

#[cfg(test)]
mod testing;

pub use dispatch::{
    DispatchStats, LogNotifier, SmtpNotifier, WebhookNotifier, dispatch_pending, notifier_from_config,
    spawn_dispatcher,
};
pub use engine::{SweepReport, SweepTarget, spawn_sweeper, sweep_paper};
pub use escalation::{Escalation, MemoryLedger, ReminderKey, ReminderLedger, escalate};
pub use events::{ApprovalSubject, EventKind, WorkflowEvent};
pub use notify::{DeliveryStatus, Notification, NotifyRouter};
pub use persistence::{NotificationRecord, SchedulerDb};
pub use policy::{PolicyContext, events_to_messages};
pub use tasks::{PaperSnapshot, Task, TaskStatus, derive_tasks, open_tasks};
