//! SQLite-backed container record store.
//!
//! # Responsibility
//! - Read encoded container blobs from the `container_records` table.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - The connection is migrated before the store is constructed.
//! - Owner lookup uses `COLLATE NOCASE`; group lookup is exact.

use super::{BackingStore, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use crate::model::group::GroupId;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const FETCH_SQL: &str = "SELECT chest_data
FROM container_records
WHERE owner_name = ?1 COLLATE NOCASE
  AND group_name = ?2
ORDER BY updated_at DESC
LIMIT 1;";

/// Backing store reading from one SQLite connection.
///
/// Fetches from several workers serialize on the connection lock.
pub struct SqliteBackingStore {
    conn: Mutex<Connection>,
}

impl SqliteBackingStore {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens an empty, migrated in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl BackingStore for SqliteBackingStore {
    fn fetch(&self, owner_name: &str, group: &GroupId) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(FETCH_SQL)?;
        let data = stmt
            .query_row(params![owner_name, group.as_str()], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(data)
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}
