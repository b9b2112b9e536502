//! Backing stores holding encoded container records.
//!
//! # Responsibility
//! - Define the byte-fetch contract the load coordinator depends on.
//! - Provide SQLite and directory-of-files implementations.
//!
//! # Invariants
//! - `fetch` distinguishes "no record" (`Ok(None)`) from transport failure.
//! - Owner names match case-insensitively; groups match exactly.
//! - Stores are read-only from the coordinator's point of view.

use crate::db::DbError;
use crate::model::group::GroupId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod file_store;
mod sqlite_store;

pub use file_store::FileBackingStore;
pub use sqlite_store::SqliteBackingStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Slow storage holding encoded container records.
///
/// Implementations may block the calling thread; the coordinator only calls
/// `fetch` from background workers.
pub trait BackingStore: Send + Sync {
    /// Returns the encoded record for `(owner_name, group)`, if any.
    fn fetch(&self, owner_name: &str, group: &GroupId) -> StoreResult<Option<Vec<u8>>>;

    /// Short stable label used in log events.
    fn kind(&self) -> &'static str;
}

/// Failure reaching the backing store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "backing database error: {err}"),
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
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
