//! SQLite-backed persistence for the reminder ledger and notification history.
//! Keeps sweeps idempotent across daemon restarts.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::locks::lock;

use crate::escalation::{ReminderKey, ReminderLedger};
use crate::notify::{DeliveryStatus, Notification};

/// SQLite-backed store for scheduler bookkeeping.
pub struct SchedulerDb {
    conn: Mutex<Connection>,
}

/// One row of the notifications table.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub key: String,
    pub paper_id: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub status: String,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> QuillflowError + '_ {
    move |e| QuillflowError::Store(format!("{context}: {e}"))
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

impl SchedulerDb {
    /// Open or create the scheduler database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        lock(&self.conn)
            .execute_batch(
                "
            -- Escalation thresholds already notified
            CREATE TABLE IF NOT EXISTS reminders_sent (
                key TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                due TEXT NOT NULL,
                days_late INTEGER NOT NULL,
                sent_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reminders_task ON reminders_sent(task_id);

            -- Notifications history
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                paper_id TEXT,
                recipients TEXT NOT NULL,      -- JSON array
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                reply_to TEXT,
                status TEXT NOT NULL DEFAULT 'pending',  -- pending, sent, failed, superseded
                error TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                sent_at TEXT
            );
         ",
            )
            .map_err(db_err("Migration"))
    }

    // ─── Reminders ────────────────────────────────────────────

    pub fn reminder_count(&self) -> Result<usize> {
        let n: i64 = lock(&self.conn)
            .query_row("SELECT COUNT(*) FROM reminders_sent", [], |r| r.get(0))
            .map_err(db_err("Count reminders"))?;
        Ok(n as usize)
    }

    // ─── Notifications ────────────────────────────────────────

    /// Insert or update the row for a notification's key.
    pub fn save_notification(&self, n: &Notification) -> Result<()> {
        let (status, error) = match &n.status {
            DeliveryStatus::Pending => ("pending", None),
            DeliveryStatus::Sent => ("sent", None),
            DeliveryStatus::Failed(e) => ("failed", Some(e.as_str())),
            DeliveryStatus::Superseded => ("superseded", None),
        };
        let m = &n.message;
        let recipients = serde_json::to_string(&m.recipients)?;
        let sent_at = (n.status == DeliveryStatus::Sent).then(|| n.updated_at.to_rfc3339());
        lock(&self.conn)
            .execute(
                "INSERT INTO notifications
                    (key, paper_id, recipients, subject, body, reply_to, status, error, attempts, created_at, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(key) DO UPDATE SET
                    status = excluded.status,
                    error = excluded.error,
                    attempts = excluded.attempts,
                    sent_at = excluded.sent_at",
                params![
                    m.key,
                    m.paper_id.as_ref().map(|p| p.to_string()),
                    recipients,
                    m.subject,
                    m.body,
                    m.reply_to,
                    status,
                    error,
                    n.attempts,
                    m.created_at.to_rfc3339(),
                    sent_at,
                ],
            )
            .map_err(db_err("Save notification"))?;
        Ok(())
    }

    /// Most recent notifications, newest first.
    pub fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationRecord>> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT key, paper_id, recipients, subject, status, error, attempts, created_at, sent_at
                 FROM notifications ORDER BY id DESC LIMIT ?1",
            )
            .map_err(db_err("Query notifications"))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let recipients: String = row.get(2)?;
                let created_at: String = row.get(7)?;
                let sent_at: Option<String> = row.get(8)?;
                Ok(NotificationRecord {
                    key: row.get(0)?,
                    paper_id: row.get(1)?,
                    recipients: serde_json::from_str(&recipients).unwrap_or_default(),
                    subject: row.get(3)?,
                    status: row.get(4)?,
                    error: row.get(5)?,
                    attempts: row.get(6)?,
                    created_at: parse_time(&created_at),
                    sent_at: sent_at.as_deref().map(parse_time),
                })
            })
            .map_err(db_err("Query notifications"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Read notifications"))
    }

    /// Status of the notification stored under `key`.
    pub fn notification_status(&self, key: &str) -> Result<Option<String>> {
        lock(&self.conn)
            .query_row(
                "SELECT status FROM notifications WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err("Query notification"))
    }
}

impl ReminderLedger for SchedulerDb {
    fn record(&self, key: &ReminderKey) -> Result<bool> {
        let changed = lock(&self.conn)
            .execute(
                "INSERT OR IGNORE INTO reminders_sent (key, task_id, due, days_late, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    key.encode(),
                    key.task_id,
                    key.due.to_rfc3339(),
                    key.days_late,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err("Record reminder"))?;
        Ok(changed == 1)
    }

    fn contains(&self, key: &ReminderKey) -> Result<bool> {
        let found: Option<i64> = lock(&self.conn)
            .query_row(
                "SELECT 1 FROM reminders_sent WHERE key = ?1",
                params![key.encode()],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err("Query reminder"))?;
        Ok(found.is_some())
    }
}
