//! Unit management admin pages.
//!
//! # Responsibility
//! - `*_page` / `manage_units` / `error_page` build view models.
//! - `do_*` handlers validate parameters, check the acting user's
//!   permission, run one service mutation and answer with a redirect.
//!
//! # Invariants
//! - Parameter and permission checks happen before any mutation.
//! - Successful mutations redirect to `ManageUnits.jsp?idUnit=<id>`.

use super::message::{AdminMessage, UrlItem};
use super::params::RequestParams;
use super::users::{DirectoryUser, UserDirectory};
use super::{
    AdminPage, PageResult, JSP_ERROR, JSP_MANAGE_UNITS, JSP_URL_DO_REMOVE_UNIT,
    MESSAGE_ACCESS_DENIED, MESSAGE_CONFIRM_REMOVE_UNIT, MESSAGE_ERROR_GENERIC_MESSAGE,
    MESSAGE_ERROR_UNIT_HAS_SUB_UNITS, MESSAGE_ERROR_UNIT_NOT_FOUND,
    MESSAGE_ERROR_USER_ALREADY_IN_AN_UNIT, MESSAGE_MANDATORY_FIELDS, PARAMETER_CANCEL,
    PARAMETER_DESCRIPTION, PARAMETER_ERROR_MESSAGE, PARAMETER_ID_PARENT, PARAMETER_ID_UNIT,
    PARAMETER_ID_USERS, PARAMETER_LABEL,
};
use crate::authz::UnitPermission;
use crate::model::unit::{Unit, UnitId, ID_ROOT, RESOURCE_TYPE};
use crate::model::user::{AdminUser, UserId};
use crate::render::{TreeRenderer, PARAMETER_ID_CURRENT_UNIT};
use crate::service::{UnitService, UnitServiceError, UnitServiceResult, UnitUserService};
use crate::web::params::parse_numeric_id;
use log::{error, info, warn};
use std::collections::{BTreeMap, HashSet};

/// Admin handlers for the unit tree.
pub struct UnitAdminPages<'conn> {
    units: UnitService<'conn>,
    unit_users: UnitUserService<'conn>,
    renderer: Box<dyn TreeRenderer>,
    directory: Box<dyn UserDirectory>,
}

impl<'conn> UnitAdminPages<'conn> {
    pub fn new(
        units: UnitService<'conn>,
        unit_users: UnitUserService<'conn>,
        renderer: impl TreeRenderer + 'static,
        directory: impl UserDirectory + 'static,
    ) -> Self {
        Self {
            units,
            unit_users,
            renderer: Box::new(renderer),
            directory: Box::new(directory),
        }
    }

    pub fn unit_service(&self) -> &UnitService<'conn> {
        &self.units
    }

    pub fn unit_user_service(&self) -> &UnitUserService<'conn> {
        &self.unit_users
    }

    // Pages

    /// Tree of all units with the selected one (root by default) expanded,
    /// plus the actions `user` may run on it.
    pub fn manage_units(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        self.respond("page_manage_units", || {
            let Some(unit) = self.selected_unit_or_root(params)? else {
                return Ok(error_view(MESSAGE_ERROR_GENERIC_MESSAGE));
            };

            let xml = self.units.get_xml_units()?;
            let mut parameters = BTreeMap::new();
            parameters.insert(
                PARAMETER_ID_CURRENT_UNIT.to_string(),
                unit.id_unit.to_string(),
            );
            let unit_tree = self.renderer.render(&xml, &parameters)?;

            Ok(PageResult::Page(AdminPage::ManageUnits {
                id_unit: unit.id_unit,
                unit_tree,
                list_sub_units: self.units.get_sub_units(unit.id_unit, false)?,
                list_unit_actions: self
                    .units
                    .get_list_actions(RESOURCE_TYPE, Some(&unit), user)?,
                list_users: self.users_of_unit(unit.id_unit)?,
            }))
        })
    }

    /// Create form; the parent is `idUnit` when it names a unit, else the root.
    pub fn create_unit_page(&self, params: &RequestParams) -> PageResult {
        self.respond("page_create_unit", || {
            let id_parent = self
                .selected_unit(params)?
                .map_or(ID_ROOT, |parent| parent.id_unit);
            Ok(PageResult::Page(AdminPage::CreateUnit { id_parent }))
        })
    }

    pub fn modify_unit_page(&self, params: &RequestParams) -> PageResult {
        self.respond("page_modify_unit", || {
            Ok(match self.selected_unit(params)? {
                Some(unit) => PageResult::Page(AdminPage::ModifyUnit { unit }),
                None => self.error_page(params),
            })
        })
    }

    /// Users not yet assigned to any unit, offered for the selected unit.
    pub fn add_users_page(&self, params: &RequestParams) -> PageResult {
        self.respond("page_add_users", || {
            let Some(unit) = self.selected_unit_or_root(params)? else {
                return Ok(error_view(MESSAGE_ERROR_GENERIC_MESSAGE));
            };
            Ok(PageResult::Page(AdminPage::AddUsers {
                unit,
                list_users: self.unassigned_users()?,
            }))
        })
    }

    pub fn confirm_remove_unit(&self, params: &RequestParams) -> PageResult {
        let Some(raw_id) = params.get(PARAMETER_ID_UNIT).filter(|raw| parse_numeric_id(raw).is_some())
        else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };
        let target = UrlItem::new(JSP_URL_DO_REMOVE_UNIT)
            .with(PARAMETER_ID_UNIT, raw_id)
            .url();
        PageResult::Redirect(AdminMessage::confirmation(MESSAGE_CONFIRM_REMOVE_UNIT, target).url())
    }

    /// Error view showing `errorMessage`, or the generic message key.
    pub fn error_page(&self, params: &RequestParams) -> PageResult {
        match params.get(PARAMETER_ERROR_MESSAGE) {
            Some(message) if !message.trim().is_empty() => error_view(message),
            _ => error_view(MESSAGE_ERROR_GENERIC_MESSAGE),
        }
    }

    // Actions

    pub fn do_create_unit(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        if params.is_set(PARAMETER_CANCEL) {
            return manage_units_redirect(params.get(PARAMETER_ID_PARENT));
        }
        let Some(id_parent) = params.numeric_id(PARAMETER_ID_PARENT) else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };
        let mut unit = Unit::new(id_parent, "", "");
        populate(&mut unit, params);
        if unit.validate().is_err() {
            return stop(MESSAGE_MANDATORY_FIELDS);
        }

        self.respond("do_create_unit", || {
            let parent = self.units.get_unit(id_parent, false)?;
            if !self
                .units
                .is_authorized(parent.as_ref(), UnitPermission::Create.as_str(), user)?
            {
                return Ok(access_denied("do_create_unit", user, id_parent));
            }
            let id_unit = self.units.create_unit(&mut unit, params)?;
            Ok(manage_units_redirect(Some(id_unit)))
        })
    }

    pub fn do_modify_unit(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        if params.is_set(PARAMETER_CANCEL) {
            return manage_units_redirect(params.get(PARAMETER_ID_UNIT));
        }
        let Some(id_unit) = params.numeric_id(PARAMETER_ID_UNIT) else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };

        self.respond("do_modify_unit", || {
            let Some(mut unit) = self.units.get_unit(id_unit, false)? else {
                return Ok(stop(MESSAGE_ERROR_UNIT_NOT_FOUND));
            };
            if !self
                .units
                .is_authorized(Some(&unit), UnitPermission::Modify.as_str(), user)?
            {
                return Ok(access_denied("do_modify_unit", user, id_unit));
            }
            populate(&mut unit, params);
            if unit.validate().is_err() {
                return Ok(stop(MESSAGE_MANDATORY_FIELDS));
            }
            self.units.update_unit(&unit, params)?;
            Ok(manage_units_redirect(Some(id_unit)))
        })
    }

    /// Removes a leaf unit and returns to its parent. An unknown id returns
    /// to the root.
    pub fn do_remove_unit(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        let Some(id_unit) = params.numeric_id(PARAMETER_ID_UNIT) else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };

        self.respond("do_remove_unit", || {
            let Some(unit) = self.units.get_unit(id_unit, false)? else {
                return Ok(manage_units_redirect(Some(ID_ROOT)));
            };
            if !self
                .units
                .is_authorized(Some(&unit), UnitPermission::Delete.as_str(), user)?
            {
                return Ok(access_denied("do_remove_unit", user, id_unit));
            }
            if self.units.has_sub_units(id_unit)? {
                return Ok(stop(MESSAGE_ERROR_UNIT_HAS_SUB_UNITS));
            }
            if unit.is_root() {
                return Ok(manage_units_redirect(Some(ID_ROOT)));
            }
            self.units.remove_unit(id_unit)?;
            Ok(manage_units_redirect(Some(unit.id_parent)))
        })
    }

    /// Assigns every `idUsers` value to the unit in one transaction.
    ///
    /// Repeated ids count once. When any user already belongs to a unit,
    /// no assignment is kept.
    pub fn do_add_users(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        if params.is_set(PARAMETER_CANCEL) {
            return manage_units_redirect(params.get(PARAMETER_ID_UNIT));
        }
        let id_users: Vec<UserId> = params
            .get_all(PARAMETER_ID_USERS)
            .iter()
            .filter_map(|raw| parse_numeric_id(raw))
            .collect();
        let Some(id_unit) = params
            .numeric_id(PARAMETER_ID_UNIT)
            .filter(|_| !params.get_all(PARAMETER_ID_USERS).is_empty())
        else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };

        self.respond("do_add_users", || {
            let Some(unit) = self.units.get_unit(id_unit, false)? else {
                return Ok(stop(MESSAGE_ERROR_UNIT_NOT_FOUND));
            };
            if !self
                .units
                .is_authorized(Some(&unit), UnitPermission::AddUser.as_str(), user)?
            {
                return Ok(access_denied("do_add_users", user, id_unit));
            }
            match self.unit_users.add_users_to_unit(id_unit, &id_users) {
                Ok(added) => {
                    info!(
                        "event=do_add_users module=web status=ok id_unit={} added_users={}",
                        id_unit, added
                    );
                    Ok(manage_units_redirect(Some(id_unit)))
                }
                Err(UnitServiceError::UserAlreadyAssigned(_)) => {
                    Ok(stop(MESSAGE_ERROR_USER_ALREADY_IN_AN_UNIT))
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Moves `idUnit` under `idParent`. Needs `MOVE_UNIT` on the moved unit
    /// and `CREATE` on the new parent.
    pub fn do_move_unit(&self, params: &RequestParams, user: &AdminUser) -> PageResult {
        if params.is_set(PARAMETER_CANCEL) {
            return manage_units_redirect(params.get(PARAMETER_ID_UNIT));
        }
        let (Some(id_unit), Some(id_parent)) = (
            params.numeric_id(PARAMETER_ID_UNIT),
            params.numeric_id(PARAMETER_ID_PARENT),
        ) else {
            return stop(MESSAGE_MANDATORY_FIELDS);
        };

        self.respond("do_move_unit", || {
            let (Some(mut unit), Some(new_parent)) = (
                self.units.get_unit(id_unit, false)?,
                self.units.get_unit(id_parent, false)?,
            ) else {
                return Ok(stop(MESSAGE_ERROR_UNIT_NOT_FOUND));
            };
            if !self
                .units
                .is_authorized(Some(&unit), UnitPermission::MoveUnit.as_str(), user)?
                || !self
                    .units
                    .is_authorized(Some(&new_parent), UnitPermission::Create.as_str(), user)?
            {
                return Ok(access_denied("do_move_unit", user, id_unit));
            }
            if !self.units.move_sub_tree(&mut unit, &new_parent)? {
                return Ok(stop(MESSAGE_MANDATORY_FIELDS));
            }
            Ok(manage_units_redirect(Some(id_unit)))
        })
    }

    // Helpers

    fn respond(
        &self,
        event: &'static str,
        handler: impl FnOnce() -> UnitServiceResult<PageResult>,
    ) -> PageResult {
        match handler() {
            Ok(result) => result,
            Err(err) if err.is_validation() => {
                warn!("event={} module=web status=rejected error={}", event, err);
                stop(MESSAGE_MANDATORY_FIELDS)
            }
            Err(err) => {
                error!("event={} module=web status=error error={}", event, err);
                PageResult::Redirect(JSP_ERROR.to_string())
            }
        }
    }

    fn selected_unit(&self, params: &RequestParams) -> UnitServiceResult<Option<Unit>> {
        match params.numeric_id(PARAMETER_ID_UNIT) {
            Some(id_unit) => self.units.get_unit(id_unit, true),
            None => Ok(None),
        }
    }

    fn selected_unit_or_root(&self, params: &RequestParams) -> UnitServiceResult<Option<Unit>> {
        match self.selected_unit(params)? {
            Some(unit) => Ok(Some(unit)),
            None => self.units.get_root_unit(true),
        }
    }

    fn users_of_unit(&self, id_unit: UnitId) -> UnitServiceResult<Vec<DirectoryUser>> {
        let members: HashSet<UserId> = self.unit_users.get_id_users(id_unit)?.into_iter().collect();
        Ok(self
            .directory
            .list_users()
            .into_iter()
            .filter(|user| members.contains(&user.user_id))
            .collect())
    }

    fn unassigned_users(&self) -> UnitServiceResult<Vec<DirectoryUser>> {
        let mut users = Vec::new();
        for user in self.directory.list_users() {
            if !self.unit_users.is_user_in_a_unit(user.user_id)? {
                users.push(user);
            }
        }
        Ok(users)
    }
}

fn populate(unit: &mut Unit, params: &RequestParams) {
    unit.label = params.get(PARAMETER_LABEL).unwrap_or_default().to_string();
    unit.description = params
        .get(PARAMETER_DESCRIPTION)
        .unwrap_or_default()
        .to_string();
}

fn stop(key: &str) -> PageResult {
    PageResult::Redirect(AdminMessage::stop(key).url())
}

fn access_denied(event: &'static str, user: &AdminUser, id_unit: UnitId) -> PageResult {
    warn!(
        "event={} module=web status=rejected reason=access_denied user_id={} id_unit={}",
        event, user.user_id, id_unit
    );
    stop(MESSAGE_ACCESS_DENIED)
}

fn error_view(message: &str) -> PageResult {
    PageResult::Page(AdminPage::Error {
        error_message: message.to_string(),
    })
}

fn manage_units_redirect(id_unit: Option<impl ToString>) -> PageResult {
    PageResult::Redirect(
        UrlItem::new(JSP_MANAGE_UNITS)
            .with_optional(PARAMETER_ID_UNIT, id_unit)
            .url(),
    )
}
