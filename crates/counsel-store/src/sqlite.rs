//! SQLite-based store implementation

use chrono::{DateTime, Local};
use counsel_api::{ClientBook, SessionBook, SlotBook};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, Document, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        // Readers on other handles never see a half-written document and
        // wait out a concurrent commit instead of failing
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Whole-document blobs (clients, slots, sessions)
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body_json TEXT NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn load_document<T: DeserializeOwned + Default>(&self, document: Document) -> StoreResult<T> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT body_json FROM documents WHERE name = ?",
                [document.name()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(serde_json::from_str(&s)?),
            None => Ok(T::default()),
        }
    }

    fn save_document<T: Serialize>(&self, document: Document, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO documents (name, body_json, revision, updated_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(name)
            DO UPDATE SET
                body_json = excluded.body_json,
                revision = documents.revision + 1,
                updated_at = excluded.updated_at
            "#,
            params![document.name(), json, counsel_util::now().to_rfc3339()],
        )?;

        debug!(document = %document, bytes = json.len(), "Document saved");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn load_clients(&self) -> StoreResult<ClientBook> {
        self.load_document(Document::Clients)
    }

    fn save_clients(&self, clients: &ClientBook) -> StoreResult<()> {
        self.save_document(Document::Clients, clients)
    }

    fn load_slots(&self) -> StoreResult<SlotBook> {
        self.load_document(Document::Slots)
    }

    fn save_slots(&self, slots: &SlotBook) -> StoreResult<()> {
        self.save_document(Document::Slots, slots)
    }

    fn load_sessions(&self) -> StoreResult<SessionBook> {
        self.load_document(Document::Sessions)
    }

    fn save_sessions(&self, sessions: &SessionBook) -> StoreResult<()> {
        self.save_document(Document::Sessions, sessions)
    }

    fn revision(&self, document: Document) -> StoreResult<u64> {
        let conn = self.conn()?;

        let revision: Option<i64> = conn
            .query_row(
                "SELECT revision FROM documents WHERE name = ?",
                [document.name()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(revision.unwrap_or(0).max(0) as u64)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| counsel_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
