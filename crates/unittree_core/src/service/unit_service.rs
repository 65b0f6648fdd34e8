//! Unit hierarchy use-case service.
//!
//! # Responsibility
//! - Read the tree (single units, children, listings, XML export).
//! - Answer hierarchy questions: ancestry, sub-unit eligibility and
//!   permission delegation through ancestors.
//! - List the actions a user may run on a unit.
//! - Run create/update/move/remove with their attribute and assignment
//!   cascades inside one transaction each.
//!
//! # Invariants
//! - The root unit cannot be removed; neither can a unit with children.
//! - A unit is never moved onto itself or under one of its descendants.
//! - Removal order is attributes, then user assignments, then the row.

use super::{run_in_transaction, UnitServiceError, UnitServiceResult};
use crate::action::{ActionCatalog, ActionSource, UnitAction};
use crate::attribute::UnitAttributeRegistry;
use crate::authz::{PermissionEngine, UnitPermission};
use crate::model::unit::{ReferenceItem, Unit, UnitFilter, UnitId, ID_NULL, ID_ROOT};
use crate::model::user::{AdminUser, UserId};
use crate::repo::unit_repo::{SqliteUnitRepository, UnitRepository};
use crate::repo::unit_user_repo::{SqliteUnitUserRepository, UnitUserRepository};
use crate::repo::ensure_connection_ready;
use crate::web::params::{parse_numeric_id, RequestParams};
use crate::xml::units_to_xml;
use log::{debug, info, warn};
use rusqlite::Connection;
use std::collections::HashSet;

/// Hierarchy service over one open connection.
pub struct UnitService<'conn> {
    conn: &'conn Connection,
    attributes: UnitAttributeRegistry,
    permissions: Box<dyn PermissionEngine>,
    actions: Box<dyn ActionSource>,
}

impl<'conn> UnitService<'conn> {
    /// Creates the service after checking the connection is migrated.
    ///
    /// Actions come from `ActionCatalog::with_unit_actions` until
    /// `with_actions` replaces them.
    pub fn new(
        conn: &'conn Connection,
        attributes: UnitAttributeRegistry,
        permissions: impl PermissionEngine + 'static,
    ) -> UnitServiceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            attributes,
            permissions: Box::new(permissions),
            actions: Box::new(ActionCatalog::with_unit_actions()),
        })
    }

    pub fn with_actions(mut self, actions: impl ActionSource + 'static) -> Self {
        self.actions = Box::new(actions);
        self
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn attributes(&self) -> &UnitAttributeRegistry {
        &self.attributes
    }

    fn units(&self) -> SqliteUnitRepository<'conn> {
        SqliteUnitRepository::new(self.conn)
    }

    fn populate_all(&self, units: &mut [Unit], with_attributes: bool) -> UnitServiceResult<()> {
        if with_attributes {
            for unit in units.iter_mut() {
                self.attributes.populate(self.conn, unit)?;
            }
        }
        Ok(())
    }

    fn listing(&self, mut units: Vec<Unit>, with_attributes: bool) -> UnitServiceResult<Vec<Unit>> {
        self.populate_all(&mut units, with_attributes)?;
        Ok(units)
    }

    pub fn get_unit(&self, id_unit: UnitId, with_attributes: bool) -> UnitServiceResult<Option<Unit>> {
        let mut unit = self.units().find_by_id(id_unit)?;
        if let Some(unit) = unit.as_mut() {
            self.populate_all(std::slice::from_mut(unit), with_attributes)?;
        }
        Ok(unit)
    }

    pub fn get_root_unit(&self, with_attributes: bool) -> UnitServiceResult<Option<Unit>> {
        self.get_unit(ID_ROOT, with_attributes)
    }

    /// Direct children of `id_unit`. `ID_NULL` yields the root unit alone.
    pub fn get_sub_units(&self, id_unit: UnitId, with_attributes: bool) -> UnitServiceResult<Vec<Unit>> {
        if id_unit == ID_NULL {
            return Ok(self.get_root_unit(with_attributes)?.into_iter().collect());
        }
        let children = self.units().find_by_filter(&UnitFilter::children_of(id_unit))?;
        self.listing(children, with_attributes)
    }

    pub fn get_units_first_level(&self, with_attributes: bool) -> UnitServiceResult<Vec<Unit>> {
        self.get_sub_units(ID_ROOT, with_attributes)
    }

    pub fn get_all_units(&self, with_attributes: bool) -> UnitServiceResult<Vec<Unit>> {
        let units = self.units().find_all()?;
        self.listing(units, with_attributes)
    }

    /// Units the user is assigned to.
    pub fn get_units_by_id_user(
        &self,
        id_user: UserId,
        with_attributes: bool,
    ) -> UnitServiceResult<Vec<Unit>> {
        let units = self.units().find_by_id_user(id_user)?;
        self.listing(units, with_attributes)
    }

    pub fn find_by_sector_id(&self, id_sector: i32) -> UnitServiceResult<Vec<Unit>> {
        Ok(self.units().find_by_filter(&UnitFilter::with_sector(id_sector))?)
    }

    pub fn get_units_without_children(&self, with_attributes: bool) -> UnitServiceResult<Vec<Unit>> {
        let units = self.units().find_without_children()?;
        self.listing(units, with_attributes)
    }

    pub fn has_sub_units(&self, id_unit: UnitId) -> UnitServiceResult<bool> {
        Ok(self.units().has_sub_units(id_unit)?)
    }

    /// Selection list for a unit picker.
    ///
    /// The first entry points back up (to the parent, labelled
    /// `parent_label`), the others are the children. `ID_NULL` lists the
    /// root alone; a missing unit lists nothing.
    pub fn get_sub_units_as_reference_list(
        &self,
        id_unit: UnitId,
        parent_label: &str,
    ) -> UnitServiceResult<Vec<ReferenceItem>> {
        if id_unit == ID_NULL {
            return Ok(self
                .get_root_unit(false)?
                .map(|root| ReferenceItem {
                    code: root.id_unit,
                    name: root.label,
                })
                .into_iter()
                .collect());
        }

        let Some(unit) = self.get_unit(id_unit, false)? else {
            return Ok(Vec::new());
        };
        let mut items = vec![ReferenceItem {
            code: unit.id_parent,
            name: parent_label.to_string(),
        }];
        items.extend(
            self.get_sub_units(id_unit, false)?
                .into_iter()
                .map(|child| ReferenceItem {
                    code: child.id_unit,
                    name: child.label,
                }),
        );
        Ok(items)
    }

    /// Whether `ancestor` sits strictly above `node` in the tree.
    pub fn is_parent(&self, ancestor: &Unit, node: &Unit) -> UnitServiceResult<bool> {
        is_ancestor(&self.units(), ancestor, node)
    }

    /// A unit can receive children when it already has some, or when every
    /// attribute handler allows it.
    pub fn can_create_sub_unit(&self, id_unit: UnitId) -> UnitServiceResult<bool> {
        if self.has_sub_units(id_unit)? {
            return Ok(true);
        }
        Ok(self.attributes.can_create_sub_unit(self.conn, id_unit)?)
    }

    /// Administrators always pass. Other users pass when the engine grants
    /// `permission` on one of their units that is `unit` itself or one of
    /// its ancestors; the engine then sees the user's unit as the resource.
    pub fn is_authorized(
        &self,
        unit: Option<&Unit>,
        permission: &str,
        user: &AdminUser,
    ) -> UnitServiceResult<bool> {
        if user.is_admin {
            return Ok(true);
        }
        let Some(unit) = unit else {
            return Ok(false);
        };

        for user_unit in self.units().find_by_id_user(user.user_id)? {
            let resource = if user_unit.id_unit == unit.id_unit {
                unit
            } else if self.is_parent(&user_unit, unit)? {
                &user_unit
            } else {
                continue;
            };
            if self.permissions.is_authorized(resource, permission, user) {
                debug!(
                    "event=unit_authorize module=service status=ok id_unit={} via_unit={} permission={} user_id={}",
                    unit.id_unit, resource.id_unit, permission, user.user_id
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Same as `is_authorized` for an id read from a request.
    ///
    /// Blank or non-numeric ids deny, administrators included.
    pub fn is_authorized_by_id(
        &self,
        id_unit: &str,
        permission: &str,
        user: &AdminUser,
    ) -> UnitServiceResult<bool> {
        let Some(id_unit) = parse_numeric_id(id_unit) else {
            return Ok(false);
        };
        let unit = self.get_unit(id_unit, false)?;
        self.is_authorized(unit.as_ref(), permission, user)
    }

    /// Actions of `action_type` that `user` may run on `unit`.
    ///
    /// Administrators get the whole list. Other users get the actions the
    /// engine grants them on `unit`, merged with those granted on each of
    /// their units that is an ancestor of `unit`. `CREATE` is left out when
    /// `unit` cannot receive sub-units. No unit means no actions.
    pub fn get_list_actions(
        &self,
        action_type: &str,
        unit: Option<&Unit>,
        user: &AdminUser,
    ) -> UnitServiceResult<Vec<UnitAction>> {
        let Some(unit) = unit else {
            return Ok(Vec::new());
        };
        let catalogue = self.actions.list_actions(action_type);

        let mut listed = if user.is_admin {
            catalogue
        } else {
            let granted_on = |resource: &Unit| {
                catalogue
                    .iter()
                    .filter(|action| self.permissions.is_authorized(resource, &action.permission, user))
                    .cloned()
                    .collect::<Vec<_>>()
            };
            let user_units = self.units().find_by_id_user(user.user_id)?;
            if user_units.is_empty() {
                return Ok(Vec::new());
            }

            let mut listed = granted_on(unit);
            for user_unit in &user_units {
                if !self.is_parent(user_unit, unit)? {
                    continue;
                }
                for action in granted_on(user_unit) {
                    if !listed.contains(&action) {
                        listed.push(action);
                    }
                }
            }
            listed
        };

        if !self.can_create_sub_unit(unit.id_unit)? {
            listed.retain(|action| action.permission != UnitPermission::Create.as_str());
        }
        Ok(listed)
    }

    /// Inserts `unit` under its `id_parent` and runs the create hooks.
    ///
    /// On success `unit.id_unit` holds the new id.
    pub fn create_unit(&self, unit: &mut Unit, params: &RequestParams) -> UnitServiceResult<UnitId> {
        unit.validate()?;
        let id_parent = unit.id_parent;

        let id_unit = run_in_transaction(self.conn, "unit_create", |tx| {
            let units = SqliteUnitRepository::new(tx);
            if units.find_by_id(id_parent)?.is_none() {
                return Err(UnitServiceError::ParentNotFound(id_parent));
            }
            if !units.has_sub_units(id_parent)?
                && !self.attributes.can_create_sub_unit(tx, id_parent)?
            {
                return Err(UnitServiceError::SubUnitsNotAllowed(id_parent));
            }

            let id_unit = units.create(unit)?;
            let mut created = unit.clone();
            created.id_unit = id_unit;
            self.attributes.on_create(tx, &created, params)?;
            Ok(id_unit)
        })?;

        unit.id_unit = id_unit;
        debug!(
            "event=unit_create module=service status=ok id_unit={} id_parent={}",
            id_unit, id_parent
        );
        Ok(id_unit)
    }

    /// Updates label and description, then runs the modify hooks.
    pub fn update_unit(&self, unit: &Unit, params: &RequestParams) -> UnitServiceResult<()> {
        unit.validate()?;
        run_in_transaction(self.conn, "unit_update", |tx| {
            let units = SqliteUnitRepository::new(tx);
            if units.find_by_id(unit.id_unit)?.is_none() {
                return Err(UnitServiceError::UnitNotFound(unit.id_unit));
            }
            self.attributes.on_modify(tx, unit, params)?;
            units.update(unit)?;
            Ok(())
        })
    }

    /// Removes a leaf unit with its attributes and user assignments.
    ///
    /// Returns `Ok(false)` without touching anything for the root, a unit
    /// with children or a missing unit.
    pub fn remove_unit(&self, id_unit: UnitId) -> UnitServiceResult<bool> {
        if id_unit == ID_ROOT {
            warn!(
                "event=unit_remove module=service status=rejected id_unit={} reason=root",
                id_unit
            );
            return Ok(false);
        }

        run_in_transaction(self.conn, "unit_remove", |tx| {
            let units = SqliteUnitRepository::new(tx);
            if units.find_by_id(id_unit)?.is_none() {
                return Ok(false);
            }
            if units.has_sub_units(id_unit)? {
                warn!(
                    "event=unit_remove module=service status=rejected id_unit={} reason=has_sub_units",
                    id_unit
                );
                return Ok(false);
            }

            self.attributes.on_remove(tx, id_unit)?;
            let removed_users = SqliteUnitUserRepository::new(tx).remove_users_from_unit(id_unit)?;
            units.remove(id_unit)?;
            info!(
                "event=unit_remove module=service status=ok id_unit={} removed_users={}",
                id_unit, removed_users
            );
            Ok(true)
        })
    }

    /// Re-parents `node` (and so its whole subtree) under `new_parent`.
    ///
    /// Returns `Ok(false)` when `new_parent` is `node` or one of its
    /// descendants. On success `node.id_parent` is updated.
    pub fn move_sub_tree(&self, node: &mut Unit, new_parent: &Unit) -> UnitServiceResult<bool> {
        let moved = run_in_transaction(self.conn, "unit_move", |tx| {
            let units = SqliteUnitRepository::new(tx);
            if node.id_unit == new_parent.id_unit || is_ancestor(&units, node, new_parent)? {
                warn!(
                    "event=unit_move module=service status=rejected id_unit={} id_new_parent={} reason=cycle",
                    node.id_unit, new_parent.id_unit
                );
                return Ok(false);
            }
            if units.find_by_id(new_parent.id_unit)?.is_none() {
                return Err(UnitServiceError::ParentNotFound(new_parent.id_unit));
            }

            self.attributes.on_move(tx, node, new_parent)?;
            units.update_parent(node.id_unit, new_parent.id_unit)?;
            Ok(true)
        })?;

        if moved {
            node.id_parent = new_parent.id_unit;
        }
        Ok(moved)
    }

    /// XML form of the whole tree, root first.
    pub fn get_xml_units(&self) -> UnitServiceResult<String> {
        let units = self.units().find_all()?;
        Ok(units_to_xml(&units, ID_ROOT)?)
    }
}

/// Upward walk from `node` looking for `ancestor`.
///
/// Stops at `ID_NULL`, at a missing unit, or at an already visited id.
fn is_ancestor(
    units: &impl UnitRepository,
    ancestor: &Unit,
    node: &Unit,
) -> UnitServiceResult<bool> {
    if ancestor.id_unit == ID_NULL || ancestor.id_unit == node.id_unit {
        return Ok(false);
    }

    let mut visited = HashSet::from([node.id_unit]);
    let mut cursor = node.id_parent;
    while cursor != ID_NULL {
        if cursor == ancestor.id_unit {
            return Ok(true);
        }
        if !visited.insert(cursor) {
            return Ok(false);
        }
        match units.find_by_id(cursor)? {
            Some(unit) => cursor = unit.id_parent,
            None => return Ok(false),
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::UnitService;
    use crate::attribute::UnitAttributeRegistry;
    use crate::authz::GrantTable;
    use crate::db::open_db_in_memory;
    use crate::model::unit::{Unit, ID_NULL, ID_ROOT};
    use crate::web::params::RequestParams;
    use rusqlite::Connection;

    fn service(conn: &Connection) -> UnitService<'_> {
        UnitService::new(conn, UnitAttributeRegistry::with_builtin_handlers(), GrantTable::new())
            .unwrap()
    }

    fn create(service: &UnitService<'_>, id_parent: i32, label: &str) -> Unit {
        let mut unit = Unit::new(id_parent, label, format!("{label} unit"));
        service.create_unit(&mut unit, &RequestParams::new()).unwrap();
        unit
    }

    #[test]
    fn create_assigns_generated_id_and_rejects_missing_parent() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);

        let finance = create(&service, ID_ROOT, "Finance");
        assert!(finance.id_unit > ID_ROOT);

        let mut orphan = Unit::new(999, "Orphan", "No parent");
        let err = service.create_unit(&mut orphan, &RequestParams::new()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(orphan.id_unit, ID_NULL);
    }

    #[test]
    fn sub_units_of_null_id_is_the_root_alone() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        create(&service, ID_ROOT, "Finance");

        let units = service.get_sub_units(ID_NULL, false).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].is_root());
    }

    #[test]
    fn reference_list_points_back_to_parent_then_children() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let finance = create(&service, ID_ROOT, "Finance");
        let payroll = create(&service, finance.id_unit, "Payroll");

        let items = service
            .get_sub_units_as_reference_list(finance.id_unit, "Parent")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].code, items[0].name.as_str()), (ID_ROOT, "Parent"));
        assert_eq!((items[1].code, items[1].name.as_str()), (payroll.id_unit, "Payroll"));

        assert_eq!(
            service.get_sub_units_as_reference_list(ID_NULL, "Parent").unwrap()[0].code,
            ID_ROOT
        );
        assert!(service
            .get_sub_units_as_reference_list(404, "Parent")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn ancestry_walk_stops_on_cyclic_rows() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let a = create(&service, ID_ROOT, "A");
        let b = create(&service, a.id_unit, "B");
        conn.execute(
            "UPDATE units SET id_parent = ?1 WHERE id_unit = ?2;",
            [b.id_unit, a.id_unit],
        )
        .unwrap();

        let root = service.get_root_unit(false).unwrap().unwrap();
        let b = service.get_unit(b.id_unit, false).unwrap().unwrap();
        assert!(!service.is_parent(&root, &b).unwrap());
    }

    #[test]
    fn unsaved_unit_is_nobody_s_ancestor() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let root = service.get_root_unit(false).unwrap().unwrap();
        let unsaved = Unit::new(ID_ROOT, "Draft", "Not stored");
        assert!(!service.is_parent(&unsaved, &root).unwrap());
    }
}
