//! Database models for roasters.

use crate::types::{RoasterId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RoasterCreateDBRequest {
    pub owner_id: UserId,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
}

/// Full replacement of the editable fields.
#[derive(Debug, Clone)]
pub struct RoasterUpdateDBRequest {
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RoasterDBResponse {
    pub id: RoasterId,
    pub owner_id: UserId,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
