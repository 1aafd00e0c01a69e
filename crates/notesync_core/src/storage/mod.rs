//! Namespaced local key-value persistence.
//!
//! # Responsibility
//! - Provide the blob store the mutation queue persists into.
//! - Keep SQL details behind the `KvStore` trait.
//!
//! # Invariants
//! - Keys are scoped by the store's namespace; two namespaces never collide.
//! - Callers treat absent and unreadable values alike (see `sync::queue`).

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use crate::db::DbError;
use crate::error::ErrorClass;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StorageResult<T> = Result<T, StorageError>;

/// Local persistence failure.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Backend refused the operation (quota, permissions, closed handle).
    Unavailable(String),
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverableLocal
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "local storage unavailable: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String key-value store.
pub trait KvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}
