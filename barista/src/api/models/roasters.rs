//! API request/response models for roasters.

use crate::db::models::roasters::RoasterDBResponse;
use crate::types::{RoasterId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Create or replace a roaster
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoasterRequest {
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoasterResponse {
    pub id: RoasterId,
    /// The user who created this roaster
    pub owner_id: UserId,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoasterDBResponse> for RoasterResponse {
    fn from(db: RoasterDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            name: db.name,
            website: db.website,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 200;

/// Query parameters for listing roasters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListRoastersQuery {
    /// Only roasters created by this user
    pub owner_id: Option<UserId>,
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,
    /// Maximum number of items to return (default: 50, max: 200)
    #[param(default = 50, minimum = 1, maximum = 200)]
    pub limit: Option<i64>,
}

impl ListRoastersQuery {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamping() {
        let query = ListRoastersQuery {
            skip: Some(-5),
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(query.skip(), 0);
        assert_eq!(query.limit(), MAX_LIMIT);

        assert_eq!(ListRoastersQuery::default().limit(), DEFAULT_LIMIT);
    }
}
