//! User-to-unit assignment service.
//!
//! # Invariants
//! - A user belongs to at most one unit.
//! - Assigning to a missing unit fails with `UnitNotFound`.
//! - A batch assignment keeps all of its users or none.

use super::{run_in_transaction, UnitServiceError, UnitServiceResult};
use crate::model::unit::UnitId;
use crate::model::user::UserId;
use crate::repo::ensure_connection_ready;
use crate::repo::unit_repo::{SqliteUnitRepository, UnitRepository};
use crate::repo::unit_user_repo::{SqliteUnitUserRepository, UnitUserRepository};
use log::warn;
use rusqlite::Connection;
use std::collections::BTreeSet;

pub struct UnitUserService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> UnitUserService<'conn> {
    pub fn new(conn: &'conn Connection) -> UnitServiceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn assignments(&self) -> SqliteUnitUserRepository<'conn> {
        SqliteUnitUserRepository::new(self.conn)
    }

    /// Returns `Ok(false)` when the user already belongs to a unit.
    pub fn add_user_to_unit(&self, id_unit: UnitId, id_user: UserId) -> UnitServiceResult<bool> {
        run_in_transaction(self.conn, "unit_user_add", |tx| {
            if SqliteUnitRepository::new(tx).find_by_id(id_unit)?.is_none() {
                return Err(UnitServiceError::UnitNotFound(id_unit));
            }
            let added = SqliteUnitUserRepository::new(tx).add(id_unit, id_user)?;
            if !added {
                warn!(
                    "event=unit_user_add module=service status=rejected id_unit={} id_user={} reason=already_assigned",
                    id_unit, id_user
                );
            }
            Ok(added)
        })
    }

    /// Assigns every user of `id_users` to `id_unit` in one transaction and
    /// returns how many were assigned. Repeated ids count once.
    ///
    /// When one of them already belongs to a unit the call fails with
    /// `UserAlreadyAssigned` and no assignment is kept.
    pub fn add_users_to_unit(&self, id_unit: UnitId, id_users: &[UserId]) -> UnitServiceResult<usize> {
        let id_users: BTreeSet<UserId> = id_users.iter().copied().collect();
        run_in_transaction(self.conn, "unit_users_add", |tx| {
            if SqliteUnitRepository::new(tx).find_by_id(id_unit)?.is_none() {
                return Err(UnitServiceError::UnitNotFound(id_unit));
            }
            let assignments = SqliteUnitUserRepository::new(tx);
            for &id_user in &id_users {
                if assignments.find_unit_of_user(id_user)?.is_some() {
                    return Err(UnitServiceError::UserAlreadyAssigned(id_user));
                }
            }
            for &id_user in &id_users {
                if !assignments.add(id_unit, id_user)? {
                    return Err(UnitServiceError::UserAlreadyAssigned(id_user));
                }
            }
            Ok(id_users.len())
        })
    }

    /// Returns `Ok(false)` when the user had no unit.
    pub fn remove_user_from_unit(&self, id_user: UserId) -> UnitServiceResult<bool> {
        run_in_transaction(self.conn, "unit_user_remove", |tx| {
            Ok(SqliteUnitUserRepository::new(tx).remove_user(id_user)?)
        })
    }

    /// Detaches every user of `id_unit`; returns how many were detached.
    pub fn remove_users_from_unit(&self, id_unit: UnitId) -> UnitServiceResult<usize> {
        run_in_transaction(self.conn, "unit_users_remove", |tx| {
            Ok(SqliteUnitUserRepository::new(tx).remove_users_from_unit(id_unit)?)
        })
    }

    pub fn get_id_users(&self, id_unit: UnitId) -> UnitServiceResult<Vec<UserId>> {
        Ok(self.assignments().list_user_ids(id_unit)?)
    }

    pub fn is_user_in_a_unit(&self, id_user: UserId) -> UnitServiceResult<bool> {
        Ok(self.get_unit_of_user(id_user)?.is_some())
    }

    pub fn get_unit_of_user(&self, id_user: UserId) -> UnitServiceResult<Option<UnitId>> {
        Ok(self.assignments().find_unit_of_user(id_user)?)
    }
}
