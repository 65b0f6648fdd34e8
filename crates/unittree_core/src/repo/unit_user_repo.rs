//! User-to-unit assignment repository.
//!
//! # Invariants
//! - A user belongs to at most one unit (`unit_users.id_user` is the key).
//! - Assignments must be removed before their unit row is deleted; the
//!   foreign key rejects the delete otherwise.

use super::{ensure_connection_ready, RepoResult};
use crate::model::unit::UnitId;
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension};

/// Persistence contract for user assignments.
pub trait UnitUserRepository {
    /// Returns `false` when the user already belongs to a unit.
    fn add(&self, id_unit: UnitId, id_user: UserId) -> RepoResult<bool>;
    /// Returns `false` when the user was not assigned.
    fn remove_user(&self, id_user: UserId) -> RepoResult<bool>;
    /// Returns the number of assignments removed.
    fn remove_users_from_unit(&self, id_unit: UnitId) -> RepoResult<usize>;
    fn list_user_ids(&self, id_unit: UnitId) -> RepoResult<Vec<UserId>>;
    fn find_unit_of_user(&self, id_user: UserId) -> RepoResult<Option<UnitId>>;
}

/// SQLite-backed assignment repository.
pub struct SqliteUnitUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new(conn))
    }
}

impl UnitUserRepository for SqliteUnitUserRepository<'_> {
    fn add(&self, id_unit: UnitId, id_user: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO unit_users (id_user, id_unit) VALUES (?1, ?2)
             ON CONFLICT (id_user) DO NOTHING;",
            params![id_user, id_unit],
        )?;
        Ok(changed == 1)
    }

    fn remove_user(&self, id_user: UserId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM unit_users WHERE id_user = ?1;", [id_user])?;
        Ok(changed == 1)
    }

    fn remove_users_from_unit(&self, id_unit: UnitId) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM unit_users WHERE id_unit = ?1;", [id_unit])?;
        Ok(changed)
    }

    fn list_user_ids(&self, id_unit: UnitId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id_user FROM unit_users WHERE id_unit = ?1 ORDER BY id_user ASC;",
        )?;
        let mut rows = stmt.query([id_unit])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn find_unit_of_user(&self, id_user: UserId) -> RepoResult<Option<UnitId>> {
        let id_unit = self
            .conn
            .query_row(
                "SELECT id_unit FROM unit_users WHERE id_user = ?1;",
                [id_user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id_unit)
    }
}
