//! SQLite bootstrap for the local key-value store.
//!
//! # Responsibility
//! - Open connections for the queue persistence layer.
//! - Bring the `kv_entries` schema up to date before first use.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A database written by a newer build is refused, never downgraded.

use crate::error::ErrorClass;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Migration step `version` failed; nothing from the batch was kept.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was migrated by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SchemaTooNew { .. } => ErrorClass::ConfigurationFatal,
            Self::Sqlite(_) | Self::Migration { .. } => ErrorClass::RecoverableLocal,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::Migration { version, source } => {
                write!(f, "kv schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "kv schema version {found} is newer than this build supports ({supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
