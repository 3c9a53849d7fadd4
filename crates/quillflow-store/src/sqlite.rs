//! SQLite record store: entity JSON keyed by id plus the edit audit trail.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::locks::lock;
use quillflow_core::model::{Edit, Entity, Query};
use quillflow_core::traits::{Batch, RecordStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> QuillflowError + '_ {
    move |e| QuillflowError::Store(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,        -- 'paper', 'note', 'edge', 'group', 'window'
                paper_id TEXT,
                person TEXT,               -- edge tail, note signature, anonymous member
                version INTEGER NOT NULL,
                body TEXT NOT NULL,        -- JSON entity
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entities_paper ON entities(paper_id, kind);
            CREATE INDEX IF NOT EXISTS idx_entities_person ON entities(person, kind);

            -- Accepted edits, append only
            CREATE TABLE IF NOT EXISTS edits (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                body TEXT NOT NULL,
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_edits_entity ON edits(entity_id);

            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )
        .map_err(db_err("Migration"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn decode(body: &str) -> Result<Entity> {
        Ok(serde_json::from_str(body)?)
    }
}

impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let conn = lock(&self.conn);
        let body: Option<String> = conn
            .query_row("SELECT body FROM entities WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err("Get entity"))?;
        body.as_deref().map(Self::decode).transpose()
    }

    fn query(&self, query: &Query) -> Result<Vec<Entity>> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT body FROM entities
                 WHERE (?1 IS NULL OR kind = ?1)
                   AND (?2 IS NULL OR paper_id = ?2)
                   AND (?3 IS NULL OR person = ?3)
                 ORDER BY id",
            )
            .map_err(db_err("Query"))?;
        let bodies = stmt
            .query_map(
                rusqlite::params![
                    query.kind.map(|k| k.as_str()),
                    query.paper_id.as_ref().map(|p| p.as_str()),
                    query.person.as_deref(),
                ],
                |row| row.get::<_, String>(0),
            )
            .map_err(db_err("Query"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Query row"))?;
        bodies.iter().map(|b| Self::decode(b)).collect()
    }

    fn edit_history(&self, entity_id: &str) -> Result<Vec<Edit>> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT body FROM edits WHERE entity_id = ?1 ORDER BY seq")
            .map_err(db_err("Edit history"))?;
        let bodies = stmt
            .query_map([entity_id], |row| row.get::<_, String>(0))
            .map_err(db_err("Edit history"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Edit history row"))?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(QuillflowError::from))
            .collect()
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        let mut conn = lock(&self.conn);
        let tx = conn.transaction().map_err(db_err("Begin"))?;
        let now = chrono::Utc::now().to_rfc3339();

        for mut entity in batch.entities {
            let current: Option<u32> = tx
                .query_row(
                    "SELECT version FROM entities WHERE id = ?1",
                    [entity.id()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err("Read version"))?;
            entity.set_version(current.map(|v| v + 1).unwrap_or(1));
            let body = serde_json::to_string(&entity)?;
            tx.execute(
                "INSERT OR REPLACE INTO entities (id, kind, paper_id, person, version, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    entity.id(),
                    entity.kind().as_str(),
                    entity.paper_id().map(|p| p.as_str()),
                    entity.person(),
                    entity.version(),
                    body,
                    now,
                ],
            )
            .map_err(db_err("Write entity"))?;
        }

        for edit in &batch.edits {
            tx.execute(
                "INSERT INTO edits (id, entity_id, body, at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    edit.id,
                    edit.entity_id,
                    serde_json::to_string(edit)?,
                    edit.at.to_rfc3339(),
                ],
            )
            .map_err(db_err("Write edit"))?;
        }

        tx.commit().map_err(db_err("Commit"))?;
        Ok(())
    }

    fn next_paper_number(&self) -> Result<u32> {
        let conn = lock(&self.conn);
        conn.query_row(
            "INSERT INTO counters (name, value) VALUES ('paper_number', 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            [],
            |row| row.get(0),
        )
        .map_err(db_err("Paper number"))
    }
}
