//! Persisted device preferences.
//!
//! # Responsibility
//! - Remember the active list id across restarts.
//! - Remember the local member id so list membership stays idempotent.

use crate::db::{open_db, open_db_in_memory, DbError};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Preference key holding the active list id.
pub const PREF_LIST_ID: &str = "listId";
/// Preference key holding the local member id.
pub const PREF_USER_ID: &str = "userId";

pub type PrefResult<T> = Result<T, PrefError>;

#[derive(Debug)]
pub enum PrefError {
    Db(DbError),
    InvalidKey(String),
}

impl Display for PrefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "preference storage failed: {err}"),
            Self::InvalidKey(key) => write!(f, "preference key is invalid: `{key}`"),
        }
    }
}

impl Error for PrefError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidKey(_) => None,
        }
    }
}

impl From<DbError> for PrefError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PrefError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Single-value device preference storage.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> PrefResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PrefResult<()>;

    fn active_list_id(&self) -> PrefResult<Option<String>> {
        self.get(PREF_LIST_ID)
    }

    fn set_active_list_id(&self, list_id: &str) -> PrefResult<()> {
        self.set(PREF_LIST_ID, list_id)
    }
}

/// SQLite-backed preference store owning its connection.
pub struct SqlitePreferenceStore {
    conn: Connection,
}

impl SqlitePreferenceStore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (or creates) the preferences file at `path`.
    pub fn open(path: impl AsRef<Path>) -> PrefResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> PrefResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, key: &str) -> PrefResult<Option<String>> {
        let key = normalize_pref_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> PrefResult<()> {
        let key = normalize_pref_key(key)?;
        self.conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}

fn normalize_pref_key(key: &str) -> PrefResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(PrefError::InvalidKey(key.to_string()));
    }
    Ok(trimmed)
}
