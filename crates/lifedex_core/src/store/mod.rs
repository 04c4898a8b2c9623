//! Key-value storage collaborator consumed by persistence.
//!
//! # Responsibility
//! - Define the minimal `get/set/remove` contract the core relies on.
//! - Provide the SQLite-backed store used by the CLI. An in-process double
//!   lives in `crate::testing`.
//!
//! # Invariants
//! - `set` replaces the whole value for a key; there are no partial writes.
//! - A failed `set` leaves the previous value untouched.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_kv;

pub use sqlite_kv::SqliteKvStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// Writing would exceed the store's capacity.
    QuotaExceeded { requested: usize, available: usize },
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded {
                requested,
                available,
            } => write!(
                f,
                "storage quota exceeded: requested {requested} bytes, {available} available"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::QuotaExceeded { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Text key-value store. Agnostic to the technology behind it.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}
