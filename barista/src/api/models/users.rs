//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::{Level, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The identity attached to a request by the authorization gate.
///
/// Built from the live database record, never from token claims alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub level: Level,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.level.is_admin()
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            name: user.name,
            level: user.level,
        }
    }
}

/// Admin request to create an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub name: String,
    pub password: String,
    /// Permission bitmask, defaults to MEMBER
    #[serde(default)]
    pub level: Option<Level>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub name: Option<String>,
    /// Changing the level requires ADMIN
    pub level: Option<Level>,
}

/// Request to change a password
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Required when changing your own password
    #[serde(default)]
    pub current_password: Option<String>,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub level: Level,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            name: user.name,
            level: user.level,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
