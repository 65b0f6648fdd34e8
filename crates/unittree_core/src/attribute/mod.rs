//! Unit attribute extension hook.
//!
//! Plugins attach extra data to units through `UnitAttributeHandler`
//! strategies registered by attribute type. The unit service calls every
//! registered handler at read, create, modify, move and remove time, inside
//! the same transaction as the unit row write.

pub mod registry;
pub mod sector;

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use registry::{UnitAttributeHandler, UnitAttributeRegistry};
pub use sector::SectorAttributeHandler;

pub type AttributeResult<T> = Result<T, AttributeError>;

#[derive(Debug)]
pub enum AttributeError {
    Db(DbError),
    /// Request carried a value the handler cannot store.
    InvalidInput {
        attribute_type: &'static str,
        message: String,
    },
    /// Handler refused the operation for the current tree state.
    Rejected {
        attribute_type: &'static str,
        message: String,
    },
    DuplicateType(&'static str),
}

impl AttributeError {
    /// Whether the failure stems from caller input rather than storage.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Rejected { .. })
    }
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidInput {
                attribute_type,
                message,
            } => write!(f, "invalid `{attribute_type}` attribute input: {message}"),
            Self::Rejected {
                attribute_type,
                message,
            } => write!(f, "`{attribute_type}` attribute rejected operation: {message}"),
            Self::DuplicateType(attribute_type) => {
                write!(f, "attribute type already registered: {attribute_type}")
            }
        }
    }
}

impl Error for AttributeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AttributeError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
