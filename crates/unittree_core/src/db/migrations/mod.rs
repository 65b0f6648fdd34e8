//! Embedded schema steps for the unit tree.
//!
//! | Version | Name           | Adds                               |
//! |---------|----------------|------------------------------------|
//! | 1       | `units`        | unit rows and the seeded root      |
//! | 2       | `unit_users`   | one-unit-per-user assignments      |
//! | 3       | `unit_sectors` | sector attribute rows              |
//!
//! Pending steps of one run share a single transaction.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "units",
        sql: include_str!("0001_units.sql"),
    },
    SchemaStep {
        version: 2,
        name: "unit_users",
        sql: include_str!("0002_unit_users.sql"),
    },
    SchemaStep {
        version: 3,
        name: "unit_sectors",
        sql: include_str!("0003_unit_sectors.sql"),
    },
];

/// Schema version this binary writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Schema version stored in `conn`; `0` for a fresh database.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Brings `conn` up to `latest_version()`.
///
/// Returns the number of steps applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let from_version = schema_version(conn)?;
    let latest_supported = latest_version();
    if from_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        let applied = tx.execute_batch(step.sql).and_then(|()| {
            tx.pragma_update(None, "user_version", step.version)
        });
        applied.map_err(|source| DbError::Migration {
            version: step.version,
            name: step.name,
            source,
        })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from_version,
        latest_supported,
        pending.len()
    );
    Ok(pending.len())
}
