// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite connection and schema.
//
// Schema:
//   printers(id, addr, format_type, comment, created_at)   -- created_at RFC 3339
//   labels(id, name, comment)
//   templates(id, label_id -> labels ON DELETE CASCADE, format_type,
//             body BLOB, body_hash)                        -- body is escaped
//   UNIQUE(label_id, format_type)

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, instrument};

use labelwerk_core::error::{LabelwerkError, Result};

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        addr        TEXT    NOT NULL,
        format_type TEXT    NOT NULL,
        comment     TEXT    NOT NULL DEFAULT '',
        created_at  TEXT    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS labels (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        name    TEXT    NOT NULL,
        comment TEXT    NOT NULL DEFAULT ''
    );
    CREATE TABLE IF NOT EXISTS templates (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        label_id    INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
        format_type TEXT    NOT NULL,
        body        BLOB    NOT NULL,
        body_hash   TEXT    NOT NULL,
        UNIQUE (label_id, format_type)
    );
"#;

/// Convert a `rusqlite::Error` into `LabelwerkError::Database`.
pub(crate) fn db_err(e: rusqlite::Error) -> LabelwerkError {
    LabelwerkError::Database(e.to_string())
}

/// Printer, label and template storage.
///
/// All methods are synchronous because `rusqlite` is. Async callers hold the
/// store behind a mutex and keep calls short.
pub struct Store {
    pub(crate) conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| LabelwerkError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| LabelwerkError::Database(format!("WAL pragma: {e}")))?;

        let store = Self::init(conn)?;
        info!("label database opened");
        Ok(store)
    }

    /// Open an in-memory database. Contents are lost on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LabelwerkError::Database(format!("open in-memory: {e}")))?;

        let store = Self::init(conn)?;
        debug!("in-memory label database opened");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Foreign keys are off by default in SQLite and are per connection.
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| LabelwerkError::Database(format!("foreign_keys pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| LabelwerkError::Database(format!("create tables: {e}")))?;

        Ok(Self { conn })
    }
}
