//! Unit repository contract and SQLite implementation.
//!
//! # Invariants
//! - Listings are ordered by `id_unit ASC`.
//! - Write paths call `Unit::validate()` before SQL mutations.
//! - `update` never touches `id_parent`; re-parenting goes through
//!   `update_parent`.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::unit::{Unit, UnitFilter, UnitId, UnitValidationError};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const UNIT_SELECT_SQL: &str = "SELECT
    u.id_unit AS id_unit,
    u.id_parent AS id_parent,
    u.label AS label,
    u.description AS description
FROM units u";

/// Persistence contract for unit rows.
pub trait UnitRepository {
    fn find_by_id(&self, id_unit: UnitId) -> RepoResult<Option<Unit>>;
    fn find_by_filter(&self, filter: &UnitFilter) -> RepoResult<Vec<Unit>>;
    fn find_all(&self) -> RepoResult<Vec<Unit>>;
    fn find_by_id_user(&self, id_user: UserId) -> RepoResult<Vec<Unit>>;
    /// Units that have no child unit.
    fn find_without_children(&self) -> RepoResult<Vec<Unit>>;
    /// Inserts `unit` and returns the generated id. `unit.id_unit` is ignored.
    fn create(&self, unit: &Unit) -> Result<UnitId, UnitWriteError>;
    fn update(&self, unit: &Unit) -> Result<(), UnitWriteError>;
    fn update_parent(&self, id_unit: UnitId, id_parent: UnitId) -> RepoResult<()>;
    fn remove(&self, id_unit: UnitId) -> RepoResult<()>;
    fn has_sub_units(&self, id_unit: UnitId) -> RepoResult<bool>;
}

/// Write failure: either the payload or the store rejected it.
#[derive(Debug)]
pub enum UnitWriteError {
    Validation(UnitValidationError),
    Repo(RepoError),
}

impl Display for UnitWriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UnitWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<UnitValidationError> for UnitWriteError {
    fn from(value: UnitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for UnitWriteError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for UnitWriteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// SQLite-backed unit repository.
pub struct SqliteUnitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitRepository<'conn> {
    /// Wraps a connection already known to be migrated.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking its schema version.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new(conn))
    }

    fn query_units(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Unit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut units = Vec::new();
        while let Some(row) = rows.next()? {
            units.push(parse_unit_row(row)?);
        }
        Ok(units)
    }
}

impl UnitRepository for SqliteUnitRepository<'_> {
    fn find_by_id(&self, id_unit: UnitId) -> RepoResult<Option<Unit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{UNIT_SELECT_SQL} WHERE u.id_unit = ?1;"))?;
        let mut rows = stmt.query([id_unit])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_unit_row(row)?));
        }
        Ok(None)
    }

    fn find_by_filter(&self, filter: &UnitFilter) -> RepoResult<Vec<Unit>> {
        let mut sql = format!("{UNIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(id_parent) = filter.id_parent {
            sql.push_str(" AND u.id_parent = ?");
            bind_values.push(Value::Integer(i64::from(id_parent)));
        }

        if let Some(id_sector) = filter.id_sector {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM unit_sectors s
                    WHERE s.id_unit = u.id_unit AND s.id_sector = ?
                )",
            );
            bind_values.push(Value::Integer(i64::from(id_sector)));
        }

        sql.push_str(" ORDER BY u.id_unit ASC;");
        self.query_units(&sql, bind_values)
    }

    fn find_all(&self) -> RepoResult<Vec<Unit>> {
        self.find_by_filter(&UnitFilter::default())
    }

    fn find_by_id_user(&self, id_user: UserId) -> RepoResult<Vec<Unit>> {
        self.query_units(
            &format!(
                "{UNIT_SELECT_SQL}
                 INNER JOIN unit_users uu ON uu.id_unit = u.id_unit
                 WHERE uu.id_user = ?1
                 ORDER BY u.id_unit ASC;"
            ),
            vec![Value::Integer(i64::from(id_user))],
        )
    }

    fn find_without_children(&self) -> RepoResult<Vec<Unit>> {
        self.query_units(
            &format!(
                "{UNIT_SELECT_SQL}
                 WHERE NOT EXISTS (
                    SELECT 1 FROM units child WHERE child.id_parent = u.id_unit
                 )
                 ORDER BY u.id_unit ASC;"
            ),
            Vec::new(),
        )
    }

    fn create(&self, unit: &Unit) -> Result<UnitId, UnitWriteError> {
        unit.validate()?;

        self.conn.execute(
            "INSERT INTO units (id_parent, label, description) VALUES (?1, ?2, ?3);",
            params![unit.id_parent, unit.label.as_str(), unit.description.as_str()],
        )?;

        let rowid = self.conn.last_insert_rowid();
        let id_unit = UnitId::try_from(rowid).map_err(|_| {
            RepoError::InvalidData(format!("generated unit id `{rowid}` overflows i32"))
        })?;
        Ok(id_unit)
    }

    fn update(&self, unit: &Unit) -> Result<(), UnitWriteError> {
        unit.validate()?;

        let changed = self.conn.execute(
            "UPDATE units
             SET label = ?2,
                 description = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id_unit = ?1;",
            params![unit.id_unit, unit.label.as_str(), unit.description.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(unit.id_unit).into());
        }
        Ok(())
    }

    fn update_parent(&self, id_unit: UnitId, id_parent: UnitId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE units
             SET id_parent = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id_unit = ?1;",
            params![id_unit, id_parent],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id_unit));
        }
        Ok(())
    }

    fn remove(&self, id_unit: UnitId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM units WHERE id_unit = ?1;", [id_unit])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id_unit));
        }
        Ok(())
    }

    fn has_sub_units(&self, id_unit: UnitId) -> RepoResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM units WHERE id_parent = ?1 LIMIT 1;",
                [id_unit],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

fn parse_unit_row(row: &Row<'_>) -> RepoResult<Unit> {
    let id_unit: UnitId = row.get("id_unit")?;
    let label: String = row.get("label")?;
    if label.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "blank label in units.label for unit {id_unit}"
        )));
    }

    Ok(Unit {
        id_unit,
        id_parent: row.get("id_parent")?,
        label,
        description: row.get("description")?,
        attributes: BTreeMap::new(),
    })
}
