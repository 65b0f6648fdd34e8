//! Actions offered on a unit in the management screen.
//!
//! # Responsibility
//! - Describe one action (label key, target page, required permission).
//! - Provide the catalogue seam the hierarchy service filters per user.
//!
//! # Invariants
//! - Within one action type a catalogue keeps each action once.

use crate::authz::UnitPermission;
use crate::model::unit::RESOURCE_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the unit action bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAction {
    /// i18n key of the label.
    pub name_key: String,
    /// Page opened by the action; the caller appends `idUnit`.
    pub url: String,
    /// Permission the user needs on the unit to see the action.
    pub permission: String,
}

impl UnitAction {
    pub fn new(
        name_key: impl Into<String>,
        url: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        Self {
            name_key: name_key.into(),
            url: url.into(),
            permission: permission.into(),
        }
    }
}

/// Source of every action registered for an action type.
pub trait ActionSource {
    fn list_actions(&self, action_type: &str) -> Vec<UnitAction>;
}

impl<F> ActionSource for F
where
    F: Fn(&str) -> Vec<UnitAction>,
{
    fn list_actions(&self, action_type: &str) -> Vec<UnitAction> {
        self(action_type)
    }
}

/// In-memory catalogue keyed by action type, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: BTreeMap<String, Vec<UnitAction>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue with the built-in unit actions under `RESOURCE_TYPE`.
    pub fn with_unit_actions() -> Self {
        let mut catalog = Self::new();
        for (permission, name_key, page) in [
            (UnitPermission::Create, "unittree.manageUnits.action.create", "CreateUnit.jsp"),
            (UnitPermission::Modify, "unittree.manageUnits.action.modify", "ModifyUnit.jsp"),
            (UnitPermission::Delete, "unittree.manageUnits.action.remove", "ConfirmRemoveUnit.jsp"),
            (UnitPermission::AddUser, "unittree.manageUnits.action.addUsers", "AddUsers.jsp"),
            (UnitPermission::MoveUnit, "unittree.manageUnits.action.moveUnit", "MoveUnit.jsp"),
        ] {
            catalog.register(
                RESOURCE_TYPE,
                UnitAction::new(
                    name_key,
                    format!("jsp/admin/plugins/unittree/{page}"),
                    permission.as_str(),
                ),
            );
        }
        catalog
    }

    /// Returns `false` when the same action is already registered for
    /// `action_type`.
    pub fn register(&mut self, action_type: impl Into<String>, action: UnitAction) -> bool {
        let actions = self.actions.entry(action_type.into()).or_default();
        if actions.contains(&action) {
            return false;
        }
        actions.push(action);
        true
    }
}

impl ActionSource for ActionCatalog {
    fn list_actions(&self, action_type: &str) -> Vec<UnitAction> {
        self.actions.get(action_type).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionCatalog, ActionSource, UnitAction};
    use crate::model::unit::RESOURCE_TYPE;

    #[test]
    fn builtin_unit_actions_follow_permission_order() {
        let permissions: Vec<String> = ActionCatalog::with_unit_actions()
            .list_actions(RESOURCE_TYPE)
            .into_iter()
            .map(|action| action.permission)
            .collect();
        assert_eq!(
            permissions,
            ["CREATE", "MODIFY", "DELETE", "ADD_USER", "MOVE_UNIT"]
        );
    }

    #[test]
    fn register_rejects_duplicates_and_keeps_types_apart() {
        let mut catalog = ActionCatalog::new();
        let export = UnitAction::new("export", "Export.jsp", "VIEW");
        assert!(catalog.register("REPORT", export.clone()));
        assert!(!catalog.register("REPORT", export.clone()));
        assert!(catalog.register("OTHER", export));

        assert_eq!(catalog.list_actions("REPORT").len(), 1);
        assert!(catalog.list_actions(RESOURCE_TYPE).is_empty());
    }
}
