//! Database models for users.

use crate::types::{Level, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub name: String,
    /// Argon2 PHC string; hashing happens before the repository is involved
    pub password_hash: String,
    pub level: Level,
}

/// Database request for updating a user. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub level: Option<Level>,
}

/// Database response for a user.
///
/// The password hash is never part of this record; see [`UserCredentials`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub level: Level,
    /// Revocation counter. Tokens carrying a different value are rejected.
    pub session_epoch: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The only shape in which a password hash leaves the database.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub password_hash: String,
}
