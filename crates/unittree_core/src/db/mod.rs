//! Unit tree storage: connection bootstrap and schema migrations.
//!
//! # Responsibility
//! - Hand out SQLite connections that carry the full unit tree schema.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A returned connection always contains the root unit row.

pub mod migrations;
mod open;

use crate::model::unit::UnitId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// One migration step failed; nothing of the batch was kept.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// File was written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Schema is current but the root row was deleted out of band.
    RootUnitMissing(UnitId),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "migration {version} ({name}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "unit tree schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::RootUnitMissing(id) => write!(f, "root unit {id} is missing"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::RootUnitMissing(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
