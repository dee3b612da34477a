//! SQLite persistence for the bot: the persona table behind the catalog and
//! the per-chat active-persona assignment.
//!
//! Every operation is a single statement, so readers never observe torn
//! state. The dispatcher opens a fresh connection per operation (see the
//! free helpers at the bottom); the store is the single source of truth for
//! chat→persona bindings.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::catalog::Persona;

// ── Rows ─────────────────────────────────────────────────────────────────

/// A persona as stored, before the catalog assigns it an origin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PersonaRow {
    pub(crate) key: String,
    pub(crate) title: String,
    pub(crate) system: String,
    pub(crate) created_by: Option<i64>,
    pub(crate) created_at: i64,
}

// ── Schema ───────────────────────────────────────────────────────────────

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS personalities (
    key TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    system TEXT NOT NULL,
    created_by INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS active_personality (
    chat_id INTEGER PRIMARY KEY,
    personality TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

// ── BotDb ────────────────────────────────────────────────────────────────

pub(crate) struct BotDb {
    conn: Connection,
}

impl BotDb {
    /// Open or create the database file with full schema.
    pub(crate) fn open_or_create(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.init_schema()?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn init_schema(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Persona operations ───────────────────────────────────────────

    /// Insert-if-absent for every built-in persona. Existing rows are left
    /// untouched so external edits to built-ins survive restarts. Returns
    /// the number of rows actually inserted.
    pub(crate) fn seed_builtins(&self, builtins: &[Persona]) -> Result<usize, String> {
        let mut inserted = 0;
        for persona in builtins {
            let changed = self
                .conn
                .execute(
                    "INSERT OR IGNORE INTO personalities(key, title, system, created_by, created_at)
                     VALUES (?1, ?2, ?3, NULL, ?4)",
                    params![
                        persona.id,
                        persona.title,
                        persona.system_prompt,
                        Utc::now().timestamp()
                    ],
                )
                .map_err(|e| format!("seed_builtins({}): {e}", persona.id))?;
            inserted += changed;
        }
        Ok(inserted)
    }

    /// Create-if-absent registration. Returns false when the key is already
    /// taken (the existing row is never overwritten).
    pub(crate) fn register_persona(
        &self,
        key: &str,
        title: &str,
        system: &str,
        created_by: Option<i64>,
    ) -> Result<bool, String> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO personalities(key, title, system, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, title, system, created_by, Utc::now().timestamp()],
            )
            .map_err(|e| format!("register_persona({key}): {e}"))?;
        Ok(changed > 0)
    }

    pub(crate) fn list_personas(&self) -> Result<Vec<PersonaRow>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, title, system, created_by, created_at FROM personalities ORDER BY key")
            .map_err(|e| format!("list_personas: {e}"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PersonaRow {
                    key: row.get(0)?,
                    title: row.get(1)?,
                    system: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| format!("list_personas: {e}"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("list_personas: {e}"))
    }

    // ── Assignment operations ────────────────────────────────────────

    /// Upsert the active persona for a chat; last call wins.
    pub(crate) fn set_active(&self, chat_id: i64, key: &str) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT INTO active_personality(chat_id, personality, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(chat_id) DO UPDATE SET
                     personality = excluded.personality,
                     updated_at = excluded.updated_at",
                params![chat_id, key, Utc::now().timestamp()],
            )
            .map_err(|e| format!("set_active({chat_id}): {e}"))?;
        Ok(())
    }

    pub(crate) fn get_active(&self, chat_id: i64) -> Result<Option<String>, String> {
        self.conn
            .query_row(
                "SELECT personality FROM active_personality WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| format!("get_active({chat_id}): {e}"))
    }

    #[cfg(test)]
    pub(crate) fn assignment_count(&self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM active_personality", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap_or(0) as usize
    }
}

// ── Per-operation helpers ────────────────────────────────────────────────
// The dispatcher never holds a connection across events: open, touch one
// row, close. Concurrent webhook deliveries resolve last-writer-wins.

pub(crate) fn set_active_persona(db_path: &Path, chat_id: i64, key: &str) -> Result<(), String> {
    let db = BotDb::open_or_create(db_path).map_err(|e| format!("open {}: {e}", db_path.display()))?;
    db.set_active(chat_id, key)
}

pub(crate) fn active_persona(db_path: &Path, chat_id: i64) -> Result<Option<String>, String> {
    let db = BotDb::open_or_create(db_path).map_err(|e| format!("open {}: {e}", db_path.display()))?;
    db.get_active(chat_id)
}

// ── Tests ────────────────────────────────────────────────────────────────
