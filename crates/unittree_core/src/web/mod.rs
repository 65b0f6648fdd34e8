//! Admin page layer of the unit tree.
//!
//! # Responsibility
//! - Read request parameters, call the unit services and answer with either
//!   a view model for the template engine or a redirect URL.
//!
//! # Invariants
//! - No handler panics or leaks service errors to the caller; unexpected
//!   failures are logged and become a redirect to `Error.jsp`.

pub mod message;
pub mod params;
pub mod unit_pages;
pub mod users;

use crate::action::UnitAction;
use crate::model::unit::{Unit, UnitId};
use serde::Serialize;
use users::DirectoryUser;

pub use message::{AdminMessage, MessageType, UrlItem};
pub use params::RequestParams;
pub use unit_pages::UnitAdminPages;
pub use users::{InMemoryUserDirectory, UserDirectory};

pub const PARAMETER_ID_UNIT: &str = "idUnit";
pub const PARAMETER_ID_PARENT: &str = "idParent";
pub const PARAMETER_ID_USERS: &str = "idUsers";
pub const PARAMETER_LABEL: &str = "label";
pub const PARAMETER_DESCRIPTION: &str = "description";
pub const PARAMETER_CANCEL: &str = "cancel";
pub const PARAMETER_ERROR_MESSAGE: &str = "errorMessage";

pub const JSP_MANAGE_UNITS: &str = "ManageUnits.jsp";
pub const JSP_ERROR: &str = "Error.jsp";
pub const JSP_URL_DO_REMOVE_UNIT: &str = "jsp/admin/plugins/unittree/DoRemoveUnit.jsp";

pub const MESSAGE_MANDATORY_FIELDS: &str = "portal.util.message.mandatoryFields";
pub const MESSAGE_ACCESS_DENIED: &str = "portal.util.message.accessDenied";
pub const MESSAGE_ERROR_GENERIC_MESSAGE: &str = "unittree.message.error.genericMessage";
pub const MESSAGE_ERROR_UNIT_NOT_FOUND: &str = "unittree.message.error.unitNotFound";
pub const MESSAGE_ERROR_UNIT_HAS_SUB_UNITS: &str = "unittree.message.error.unitHasSubUnits";
pub const MESSAGE_ERROR_USER_ALREADY_IN_AN_UNIT: &str = "unittree.message.error.userAlreadyInAnUnit";
pub const MESSAGE_CONFIRM_REMOVE_UNIT: &str = "unittree.message.removeUnit";

/// Outcome of one admin handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    Page(AdminPage),
    Redirect(String),
}

impl PageResult {
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Self::Redirect(url) => Some(url),
            Self::Page(_) => None,
        }
    }
}

/// View models handed to the template engine, tagged by `view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AdminPage {
    #[serde(rename_all = "camelCase")]
    ManageUnits {
        id_unit: UnitId,
        unit_tree: String,
        list_sub_units: Vec<Unit>,
        list_unit_actions: Vec<UnitAction>,
        list_users: Vec<DirectoryUser>,
    },
    #[serde(rename_all = "camelCase")]
    CreateUnit { id_parent: UnitId },
    ModifyUnit { unit: Unit },
    #[serde(rename_all = "camelCase")]
    AddUsers {
        unit: Unit,
        list_users: Vec<DirectoryUser>,
    },
    #[serde(rename_all = "camelCase")]
    Error { error_message: String },
}
