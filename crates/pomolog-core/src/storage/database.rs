//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Completed and partial sessions (batch append, fetch, basic CRUD)
//! - Key-value store for application state (the CLI keeps its timer here)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{DatabaseError, StoreError, ValidationError};
use crate::session::{FocusRating, SessionRecord, StoredSession};
use crate::timer::PhaseKind;

use super::data_dir;
use super::migrations;
use super::store::{AppendReceipt, SessionStore};

const DB_FILE: &str = "pomolog.db";

const SELECT_SESSIONS: &str =
    "SELECT id, start_time, end_time, elapsed_minutes, phase_kind, focus_rating, category
     FROM sessions";

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/pomolog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = Self::default_path().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&path)
    }

    /// `pomolog.db` inside the data directory.
    pub fn default_path() -> std::io::Result<PathBuf> {
        Ok(data_dir()?.join(DB_FILE))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Insert a batch in a single transaction.
    ///
    /// Either every record is stored or, on any error, none is.
    pub fn insert_sessions(&self, records: &[SessionRecord]) -> Result<Vec<i64>, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sessions
                    (start_time, end_time, elapsed_minutes, phase_kind, focus_rating, category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.start_time.to_rfc3339(),
                    record.end_time.to_rfc3339(),
                    record.elapsed_minutes,
                    record.phase_kind.as_str(),
                    record.focus_rating.value(),
                    record.category,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// All sessions, oldest end time first.
    pub fn all_sessions(&self) -> Result<Vec<StoredSession>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_SESSIONS} ORDER BY end_time, id"))?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    pub fn get_session(&self, id: i64) -> Result<StoredSession, DatabaseError> {
        self.conn
            .query_row(
                &format!("{SELECT_SESSIONS} WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()?
            .ok_or(DatabaseError::NotFound { id })
    }

    pub fn update_session(&self, id: i64, record: &SessionRecord) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE sessions SET
                start_time = ?1,
                end_time = ?2,
                elapsed_minutes = ?3,
                phase_kind = ?4,
                focus_rating = ?5,
                category = ?6
             WHERE id = ?7",
            params![
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.elapsed_minutes,
                record.phase_kind.as_str(),
                record.focus_rating.value(),
                record.category,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { id });
        }
        Ok(())
    }

    pub fn delete_session(&self, id: i64) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { id });
        }
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn append_sessions(&mut self, records: &[SessionRecord]) -> Result<AppendReceipt, StoreError> {
        if records.is_empty() {
            return Err(StoreError::Rejected("No sessions provided.".into()));
        }
        for record in records {
            record
                .validate()
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
        }
        let ids = self.insert_sessions(records)?;
        Ok(AppendReceipt::stored(ids.len()))
    }

    fn fetch_all_sessions(&self) -> Result<Vec<StoredSession>, StoreError> {
        Ok(self.all_sessions()?)
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    let phase: String = row.get(4)?;
    let phase_kind = PhaseKind::parse(&phase).ok_or_else(|| {
        conversion_error(
            4,
            ValidationError::InvalidValue {
                field: "phase_kind".into(),
                message: format!("unknown phase '{phase}'"),
            },
        )
    })?;
    let rating: u8 = row.get(5)?;
    let focus_rating = FocusRating::new(rating).map_err(|e| conversion_error(5, e))?;

    Ok(StoredSession {
        id: row.get(0)?,
        record: SessionRecord {
            start_time: parse_timestamp(row, 1)?,
            end_time: parse_timestamp(row, 2)?,
            elapsed_minutes: row.get(3)?,
            phase_kind,
            focus_rating,
            category: row.get(6)?,
        },
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, err: ValidationError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rec(phase: PhaseKind, minutes: i64, category: &str) -> SessionRecord {
        let end = Utc.with_ymd_and_hms(2025, 5, 24, 10, 0, 0).unwrap();
        SessionRecord {
            start_time: end - Duration::minutes(minutes),
            end_time: end,
            elapsed_minutes: minutes as f64,
            phase_kind: phase,
            focus_rating: FocusRating::new(3).unwrap(),
            category: category.into(),
        }
    }

    #[test]
    fn append_and_fetch() {
        let mut db = Database::open_memory().unwrap();
        let receipt = db
            .append_sessions(&[rec(PhaseKind::Work, 30, "Job"), rec(PhaseKind::Rest, 5, "")])
            .unwrap();
        assert_eq!(receipt.stored, 2);

        let all = db.fetch_all_sessions().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].record, rec(PhaseKind::Work, 30, "Job"));
        assert_eq!(all[1].record.phase_kind, PhaseKind::Rest);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut db = Database::open_memory().unwrap();
        assert!(matches!(
            db.append_sessions(&[]),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn invalid_record_stores_nothing() {
        let mut db = Database::open_memory().unwrap();
        let mut bad = rec(PhaseKind::Work, 10, "");
        bad.end_time = bad.start_time - Duration::minutes(1);
        assert!(db
            .append_sessions(&[rec(PhaseKind::Work, 30, "Job"), bad])
            .is_err());
        assert!(db.fetch_all_sessions().unwrap().is_empty());
    }

    #[test]
    fn crud_primitives() {
        let db = Database::open_memory().unwrap();
        let ids = db.insert_sessions(&[rec(PhaseKind::Work, 30, "Job")]).unwrap();
        let id = ids[0];

        let mut stored = db.get_session(id).unwrap();
        assert_eq!(stored.record.category, "Job");

        stored.record.category = "Personal".into();
        stored.record.focus_rating = FocusRating::new(5).unwrap();
        db.update_session(id, &stored.record).unwrap();
        let updated = db.get_session(id).unwrap();
        assert_eq!(updated.record.category, "Personal");
        assert_eq!(updated.record.focus_rating.value(), 5);

        db.delete_session(id).unwrap();
        assert!(matches!(
            db.get_session(id),
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(matches!(
            db.delete_session(id),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.insert_sessions(&[rec(PhaseKind::Work, 25, "Job")]).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.all_sessions().unwrap().len(), 1);
    }
}
