//! Portal administrator identity as seen by the unit tree.

use serde::{Deserialize, Serialize};

/// Integer identifier of a portal user.
pub type UserId = i32;

/// Administrator acting on the unit tree.
///
/// Owned by the portal user store; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub user_id: UserId,
    pub access_code: String,
    /// Administrators bypass every unit permission check.
    pub is_admin: bool,
}

impl AdminUser {
    pub fn new(user_id: UserId, access_code: impl Into<String>) -> Self {
        Self {
            user_id,
            access_code: access_code.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId, access_code: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(user_id, access_code)
        }
    }
}
