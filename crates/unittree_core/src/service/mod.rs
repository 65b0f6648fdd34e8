//! Use-case services over the unit tree.
//!
//! # Responsibility
//! - Enforce hierarchy invariants above the repository layer.
//! - Run every multi-step mutation as one ordered sequence inside a single
//!   `IMMEDIATE` transaction.
//!
//! # Invariants
//! - A failing step drops the transaction, rolling back earlier steps.
//! - Lookups of missing units return `Ok(None)` or empty lists.

pub mod unit_service;
pub mod unit_user_service;

pub use unit_service::UnitService;
pub use unit_user_service::UnitUserService;

use crate::attribute::AttributeError;
use crate::db::DbError;
use crate::model::unit::{UnitId, UnitValidationError};
use crate::model::user::UserId;
use crate::repo::unit_repo::UnitWriteError;
use crate::repo::RepoError;
use crate::xml::XmlError;
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type UnitServiceResult<T> = Result<T, UnitServiceError>;

/// Errors surfaced by unit services.
#[derive(Debug)]
pub enum UnitServiceError {
    /// Unit payload violates field constraints.
    Validation(UnitValidationError),
    /// Target parent of a create does not exist.
    ParentNotFound(UnitId),
    /// Target of a write does not exist.
    UnitNotFound(UnitId),
    /// Parent cannot host sub-units because of its attributes.
    SubUnitsNotAllowed(UnitId),
    /// User already belongs to a unit.
    UserAlreadyAssigned(UserId),
    Attribute(AttributeError),
    Xml(XmlError),
    Repo(RepoError),
}

impl UnitServiceError {
    /// Whether the caller sent something the domain rejects, as opposed to a
    /// storage or rendering failure.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_)
            | Self::ParentNotFound(_)
            | Self::UnitNotFound(_)
            | Self::SubUnitsNotAllowed(_)
            | Self::UserAlreadyAssigned(_) => true,
            Self::Attribute(err) => err.is_validation(),
            Self::Xml(_) | Self::Repo(_) => false,
        }
    }
}

impl Display for UnitServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ParentNotFound(id) => write!(f, "parent unit not found: {id}"),
            Self::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            Self::SubUnitsNotAllowed(id) => write!(f, "unit {id} cannot host sub-units"),
            Self::UserAlreadyAssigned(id) => write!(f, "user {id} already belongs to a unit"),
            Self::Attribute(err) => write!(f, "{err}"),
            Self::Xml(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UnitServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Attribute(err) => Some(err),
            Self::Xml(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ParentNotFound(_)
            | Self::UnitNotFound(_)
            | Self::SubUnitsNotAllowed(_)
            | Self::UserAlreadyAssigned(_) => None,
        }
    }
}

impl From<UnitValidationError> for UnitServiceError {
    fn from(value: UnitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for UnitServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::UnitNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<UnitWriteError> for UnitServiceError {
    fn from(value: UnitWriteError) -> Self {
        match value {
            UnitWriteError::Validation(err) => Self::Validation(err),
            UnitWriteError::Repo(err) => err.into(),
        }
    }
}

impl From<AttributeError> for UnitServiceError {
    fn from(value: AttributeError) -> Self {
        Self::Attribute(value)
    }
}

impl From<XmlError> for UnitServiceError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

impl From<rusqlite::Error> for UnitServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::Db(DbError::Sqlite(value)))
    }
}

/// Runs `steps` inside one `IMMEDIATE` transaction.
///
/// Commits when `steps` succeeds; otherwise the transaction is dropped,
/// which rolls back everything `steps` wrote.
pub(crate) fn run_in_transaction<T>(
    conn: &Connection,
    operation: &'static str,
    steps: impl FnOnce(&Transaction<'_>) -> UnitServiceResult<T>,
) -> UnitServiceResult<T> {
    let started_at = Instant::now();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    match steps(&tx) {
        Ok(value) => {
            tx.commit()?;
            info!(
                "event={} module=service status=ok duration_ms={}",
                operation,
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) if err.is_validation() => {
            warn!(
                "event={} module=service status=rejected duration_ms={} error={}",
                operation,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
        Err(err) => {
            error!(
                "event={} module=service status=error duration_ms={} error_code=rolled_back error={}",
                operation,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
