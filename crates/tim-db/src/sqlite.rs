//! SQLite backend.
//!
//! # Schema
//!
//! - `sessions`: one row per entry, keyed by the entry id
//! - `tags`: every tag ever used; rows are never deleted
//! - `session_tags`: links sessions to tags, with the tag's position in the
//!   entry so display order survives a round trip
//!
//! Timestamps are stored as RFC 3339 UTC text (e.g. `2025-01-15T10:30:00Z`).
//! A save rewrites `sessions` and `session_tags` inside one transaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tim_core::{
    Entry, EntryId, LoadWarning, Snapshot, Storage, StorageError, Tag, format_timestamp,
    parse_timestamp,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The directory holding the database could not be created.
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        Self::Backend {
            backend: "sqlite",
            source: Box::new(err),
        }
    }
}

/// Entries persisted in a relational schema.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

struct SessionRow {
    id: i64,
    start_time: String,
    end_time: Option<String>,
    description: Option<String>,
}

impl SqliteStore {
    /// Opens the database at `path`, creating it and its directory if needed.
    ///
    /// Fails when the file exists but is not a SQLite database.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            -- start_time/end_time: RFC 3339 UTC, end_time NULL while active
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                start_time TEXT NOT NULL,
                end_time TEXT,
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);

            CREATE TABLE IF NOT EXISTS session_tags (
                session_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (session_id, tag_id),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_session_tags_tag ON session_tags(tag_id);
            ",
        )?;
        Ok(())
    }

    /// Every tag ever stored, sorted by name.
    #[cfg(test)]
    fn tag_names(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT name FROM tags ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn session_rows(&self) -> Result<Vec<SessionRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, start_time, end_time, description
            FROM sessions
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                start_time: row.get(1)?,
                end_time: row.get(2)?,
                description: row.get(3)?,
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    fn session_tags(&self) -> Result<HashMap<i64, Vec<String>>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT st.session_id, t.name
            FROM session_tags st
            JOIN tags t ON t.id = st.tag_id
            ORDER BY st.session_id ASC, st.position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let session_id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            Ok((session_id, name))
        })?;
        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let (session_id, name) = row?;
            tags.entry(session_id).or_default().push(name);
        }
        Ok(tags)
    }

    fn load_snapshot(&self) -> Result<Snapshot, DbError> {
        let mut tags = self.session_tags()?;
        let mut snapshot = Snapshot::default();

        for (position, row) in self.session_rows()?.into_iter().enumerate() {
            let names = tags.remove(&row.id).unwrap_or_default();
            match decode_session(row, names) {
                Ok(entry) => snapshot.entries.push(entry),
                Err(reason) => snapshot
                    .warnings
                    .push(LoadWarning::SkippedRecord { position, reason }),
            }
        }
        Ok(snapshot)
    }

    fn replace_all(&mut self, entries: &[Entry]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM session_tags", [])?;
        tx.execute("DELETE FROM sessions", [])?;
        {
            let mut insert_session = tx.prepare(
                "INSERT INTO sessions (id, start_time, end_time, description) VALUES (?, ?, ?, ?)",
            )?;
            let mut insert_tag = tx.prepare("INSERT OR IGNORE INTO tags (name) VALUES (?)")?;
            let mut tag_id = tx.prepare("SELECT id FROM tags WHERE name = ?")?;
            let mut link =
                tx.prepare("INSERT INTO session_tags (session_id, tag_id, position) VALUES (?, ?, ?)")?;

            for entry in entries {
                let id = entry.id().value();
                insert_session.execute(params![
                    id,
                    format_timestamp(entry.start()),
                    entry.end().map(format_timestamp),
                    entry.description(),
                ])?;
                for (position, tag) in (0_i64..).zip(entry.tags()) {
                    insert_tag.execute(params![tag.as_str()])?;
                    let tag_row: Option<i64> = tag_id
                        .query_row(params![tag.as_str()], |row| row.get(0))
                        .optional()?;
                    if let Some(tag_row) = tag_row {
                        link.execute(params![id, tag_row, position])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn decode_session(row: SessionRow, tags: Vec<String>) -> Result<Entry, String> {
    let start = parse_timestamp(&row.start_time).map_err(|err| err.to_string())?;
    let end = row
        .end_time
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|err| err.to_string())?;
    let tags = tags
        .into_iter()
        .map(Tag::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.to_string())?;
    Entry::from_parts(EntryId::new(row.id), start, end, tags, row.description)
        .map_err(|err| err.to_string())
}

impl Storage for SqliteStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let snapshot = self.load_snapshot()?;
        tracing::debug!(
            entries = snapshot.entries.len(),
            skipped = snapshot.warnings.len(),
            "loaded sqlite store"
        );
        Ok(snapshot)
    }

    fn save(&mut self, entries: &[Entry]) -> Result<(), StorageError> {
        self.replace_all(entries)?;
        tracing::debug!(entries = entries.len(), "saved sqlite store");
        Ok(())
    }
}
