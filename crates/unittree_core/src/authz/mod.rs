//! Unit permissions and the permission engine seam.
//!
//! The engine is only asked about a unit after the hierarchy walk in
//! `UnitService::is_authorized` has picked which unit the user acts through.

use crate::model::unit::{Unit, UnitId};
use crate::model::user::{AdminUser, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Permission matching every other permission in a `GrantTable`.
pub const WILDCARD_PERMISSION: &str = "*";

/// Permissions a unit resource accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitPermission {
    View,
    Create,
    Modify,
    Delete,
    AddUser,
    RemoveUser,
    MoveUnit,
}

impl UnitPermission {
    pub const ALL: [UnitPermission; 7] = [
        Self::View,
        Self::Create,
        Self::Modify,
        Self::Delete,
        Self::AddUser,
        Self::RemoveUser,
        Self::MoveUnit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Create => "CREATE",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::AddUser => "ADD_USER",
            Self::RemoveUser => "REMOVE_USER",
            Self::MoveUnit => "MOVE_UNIT",
        }
    }
}

impl Display for UnitPermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitPermission {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| format!("unknown unit permission `{value}`"))
    }
}

/// Grant/deny oracle for one `(resource, permission, user)` triple.
pub trait PermissionEngine {
    fn is_authorized(&self, resource: &Unit, permission: &str, user: &AdminUser) -> bool;
}

impl<F> PermissionEngine for F
where
    F: Fn(&Unit, &str, &AdminUser) -> bool,
{
    fn is_authorized(&self, resource: &Unit, permission: &str, user: &AdminUser) -> bool {
        self(resource, permission, user)
    }
}

/// In-memory engine: explicit `(user, unit, permission)` grants.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: HashSet<(UserId, UnitId, String)>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, id_user: UserId, id_unit: UnitId, permission: impl Into<String>) {
        self.grants.insert((id_user, id_unit, permission.into()));
    }

    /// Grants every permission on `id_unit`.
    pub fn grant_all(&mut self, id_user: UserId, id_unit: UnitId) {
        self.grant(id_user, id_unit, WILDCARD_PERMISSION);
    }

    pub fn revoke(&mut self, id_user: UserId, id_unit: UnitId, permission: &str) -> bool {
        self.grants
            .remove(&(id_user, id_unit, permission.to_string()))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl PermissionEngine for GrantTable {
    fn is_authorized(&self, resource: &Unit, permission: &str, user: &AdminUser) -> bool {
        [permission, WILDCARD_PERMISSION].iter().any(|candidate| {
            self.grants
                .contains(&(user.user_id, resource.id_unit, (*candidate).to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GrantTable, PermissionEngine, UnitPermission};
    use crate::model::unit::{Unit, ID_ROOT};
    use crate::model::user::AdminUser;

    fn unit(id_unit: i32) -> Unit {
        let mut unit = Unit::new(ID_ROOT, format!("Unit {id_unit}"), "desc");
        unit.id_unit = id_unit;
        unit
    }

    #[test]
    fn permission_names_round_trip_through_from_str() {
        for permission in UnitPermission::ALL {
            assert_eq!(permission.as_str().parse::<UnitPermission>(), Ok(permission));
        }
        assert!("EDIT".parse::<UnitPermission>().is_err());
    }

    #[test]
    fn grant_table_matches_exact_grants_only() {
        let mut table = GrantTable::new();
        table.grant(5, 2, "MODIFY");
        let user = AdminUser::new(5, "jdoe");

        assert!(table.is_authorized(&unit(2), "MODIFY", &user));
        assert!(!table.is_authorized(&unit(2), "DELETE", &user));
        assert!(!table.is_authorized(&unit(3), "MODIFY", &user));
        assert!(!table.is_authorized(&unit(2), "MODIFY", &AdminUser::new(6, "other")));

        assert!(table.revoke(5, 2, "MODIFY"));
        assert!(table.is_empty());
        assert!(!table.is_authorized(&unit(2), "MODIFY", &user));
    }

    #[test]
    fn wildcard_grant_covers_any_permission() {
        let mut table = GrantTable::new();
        table.grant_all(5, 2);
        let user = AdminUser::new(5, "jdoe");

        assert!(table.is_authorized(&unit(2), "DELETE", &user));
        assert!(table.is_authorized(&unit(2), "CUSTOM_PLUGIN_RIGHT", &user));
        assert!(!table.is_authorized(&unit(4), "DELETE", &user));
    }

    #[test]
    fn closures_act_as_engines() {
        let engine = |resource: &Unit, permission: &str, _user: &AdminUser| {
            resource.id_unit == 1 && permission == "VIEW"
        };
        let user = AdminUser::new(1, "x");
        assert!(engine.is_authorized(&unit(1), "VIEW", &user));
        assert!(!engine.is_authorized(&unit(1), "DELETE", &user));
    }
}
