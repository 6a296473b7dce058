//! Staff directory lookups.
//!
//! Mentions (`@username`) and role-addressed notices are resolved to user
//! ids through a [`UserDirectory`]. Lookup failures never fail the action
//! that triggered the notice; callers log and move on.

use academy_core::types::DbId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: DbId,
    pub username: String,
    pub role: String,
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, id: DbId) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Case-insensitive username lookup.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Active users holding `role`.
    async fn users_with_role(&self, role: &str) -> Result<Vec<DirectoryUser>, DirectoryError>;
}

/// Directory backed by a fixed list, loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: Vec<DirectoryUser>,
}

impl StaticDirectory {
    pub fn new(users: Vec<DirectoryUser>) -> Self {
        Self { users }
    }

    /// Parse a JSON array of [`DirectoryUser`]s.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find(&self, id: DbId) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.is_active && u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn users_with_role(&self, role: &str) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.is_active && u.role == role)
            .cloned()
            .collect())
    }
}
