//! Opening unit tree databases.
//!
//! # Invariants
//! - `foreign_keys` is on for every returned connection.
//! - The schema is at `latest_version()` and the root unit row is present.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::model::unit::{ID_NULL, ID_ROOT};
use log::{error, info};
use rusqlite::{Connection, OptionalExtension};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

enum OpenTarget {
    File(PathBuf),
    Memory,
}

impl OpenTarget {
    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

impl Display for OpenTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_) => f.write_str("file"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Opens (or creates) the unit tree database at `path`.
///
/// Pending migrations are applied before the connection is returned.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(OpenTarget::File(path.as_ref().to_path_buf()))
}

/// Opens a throwaway in-memory unit tree, mostly for tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(OpenTarget::Memory)
}

fn open_target(target: OpenTarget) -> DbResult<Connection> {
    let started_at = Instant::now();
    let prepared = target
        .connect()
        .map_err(DbError::from)
        .and_then(|mut conn| prepare(&mut conn).map(|applied| (conn, applied)));

    match prepared {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok mode={} migrations_applied={} duration_ms={}",
                target,
                applied,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error={}",
                target,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<usize> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let applied = apply_migrations(conn)?;
    verify_root_unit(conn)?;
    Ok(applied)
}

fn verify_root_unit(conn: &Connection) -> DbResult<()> {
    let root_parent: Option<i32> = conn
        .query_row(
            "SELECT id_parent FROM units WHERE id_unit = ?1;",
            [ID_ROOT],
            |row| row.get(0),
        )
        .optional()?;
    match root_parent {
        Some(ID_NULL) => Ok(()),
        _ => Err(DbError::RootUnitMissing(ID_ROOT)),
    }
}
