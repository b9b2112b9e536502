//! Schema steps for the container record store.
//!
//! # Invariants
//! - Versions are strictly increasing; `user_version` tracks the last one applied.
//! - Pending steps run in one transaction, so a failure leaves the old schema.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Table every container lookup reads.
pub const RECORDS_TABLE: &str = "container_records";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "container_records",
    sql: include_str!("0001_container_records.sql"),
}];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in `conn`; 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Brings `conn` up to [`latest_version`] and checks the records table.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than this build.
/// - `MigrationFailed` naming the step that failed.
/// - `MissingTable` when the version is current but `container_records` is gone.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current = schema_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    if current < latest {
        let tx = conn.transaction()?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            tx.execute_batch(migration.sql)
                .and_then(|()| {
                    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
                })
                .map_err(|source| DbError::MigrationFailed {
                    version: migration.version,
                    name: migration.name,
                    source,
                })?;
            info!(
                "event=db_migrate module=db status=ok version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
    }

    if !table_exists(conn, RECORDS_TABLE)? {
        return Err(DbError::MissingTable(RECORDS_TABLE));
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}
