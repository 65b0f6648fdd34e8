//! Portal user directory as seen by the admin pages.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// One portal user listed on unit pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub user_id: UserId,
    pub access_code: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
}

impl DirectoryUser {
    pub fn new(user_id: UserId, access_code: impl Into<String>) -> Self {
        Self {
            user_id,
            access_code: access_code.into(),
            last_name: String::new(),
            first_name: String::new(),
            email: String::new(),
        }
    }
}

/// Source of portal users; the user store itself lives outside this crate.
pub trait UserDirectory {
    /// Every known user, in display order.
    fn list_users(&self) -> Vec<DirectoryUser>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Vec<DirectoryUser>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<DirectoryUser>) -> Self {
        Self { users }
    }

    pub fn push(&mut self, user: DirectoryUser) {
        self.users.push(user);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn list_users(&self) -> Vec<DirectoryUser> {
        self.users.clone()
    }
}
