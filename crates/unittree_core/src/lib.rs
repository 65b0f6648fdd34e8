//! Core domain logic for the unit tree.
//! Organizational units form one rooted tree; this crate owns its storage,
//! hierarchy rules, permission delegation and admin page handlers.

pub mod action;
pub mod attribute;
pub mod authz;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;
pub mod service;
pub mod web;
pub mod xml;

pub use action::{ActionCatalog, ActionSource, UnitAction};
pub use attribute::{SectorAttributeHandler, UnitAttributeHandler, UnitAttributeRegistry};
pub use authz::{GrantTable, PermissionEngine, UnitPermission};
pub use config::{ConfigError, UnitTreeConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::unit::{Unit, UnitId, UnitValidationError, ID_NULL, ID_ROOT};
pub use model::user::{AdminUser, UserId};
pub use render::{HtmlTreeRenderer, TreeRenderer};
pub use repo::{RepoError, RepoResult};
pub use service::{UnitService, UnitServiceError, UnitServiceResult, UnitUserService};
pub use web::{AdminPage, PageResult, RequestParams, UnitAdminPages};

/// Liveness check behind the CLI `ping` command.
pub fn ping() -> &'static str {
    "pong"
}

/// Version of this library, as published in its manifest.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
