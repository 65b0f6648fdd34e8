//! Repository layer over the SQLite unit tree schema.
//!
//! # Responsibility
//! - Keep SQL inside the persistence boundary.
//! - Report missing rows on writes as `RepoError::NotFound`; reads return
//!   `Ok(None)` or empty lists instead.
//!
//! # Invariants
//! - Repositories never open transactions themselves. Callers that need
//!   atomic multi-step writes hand in a `Transaction` (it derefs to
//!   `Connection`).

pub mod unit_repo;
pub mod unit_user_repo;

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::unit::UnitId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors shared by unit and unit-user repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(UnitId),
    /// Persisted data cannot be mapped to the read model.
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "unit not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid unit data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "unit repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fails unless `conn` carries the fully migrated schema.
pub fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
