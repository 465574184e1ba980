//! Database repository for roasters.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::roasters::{RoasterCreateDBRequest, RoasterDBResponse, RoasterUpdateDBRequest},
    },
    types::{RoasterId, UserId},
};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

const ROASTER_COLUMNS: &str = "id, owner_id, name, website, description, created_at, updated_at";

/// Filter for listing roasters
#[derive(Debug, Clone, Default)]
pub struct RoasterFilter {
    /// Only roasters created by this user
    pub owner_id: Option<UserId>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Roasters<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Roasters<'c> {
    type CreateRequest = RoasterCreateDBRequest;
    type UpdateRequest = RoasterUpdateDBRequest;
    type Response = RoasterDBResponse;
    type Id = RoasterId;
    type Filter = RoasterFilter;

    #[instrument(skip(self, request), fields(name = %request.name, owner_id = request.owner_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let roaster = sqlx::query_as::<_, RoasterDBResponse>(&format!(
            "INSERT INTO roasters (owner_id, name, website, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {ROASTER_COLUMNS}"
        ))
        .bind(request.owner_id)
        .bind(&request.name)
        .bind(request.website.as_deref())
        .bind(request.description.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(roaster)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let roaster = sqlx::query_as::<_, RoasterDBResponse>(&format!(
            "SELECT {ROASTER_COLUMNS} FROM roasters WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(roaster)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let roasters = sqlx::query_as::<_, RoasterDBResponse>(&format!(
            "SELECT {ROASTER_COLUMNS} FROM roasters
             WHERE deleted_at IS NULL AND (? IS NULL OR owner_id = ?)
             ORDER BY name COLLATE NOCASE, id
             LIMIT ? OFFSET ?"
        ))
        .bind(filter.owner_id)
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(roasters)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE roasters SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        sqlx::query_as::<_, RoasterDBResponse>(&format!(
            "UPDATE roasters SET name = ?, website = ?, description = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {ROASTER_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(request.website.as_deref())
        .bind(request.description.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)
    }
}

impl<'c> Roasters<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Owner of a live roaster, used by the ownership gate.
    #[instrument(skip(self), err)]
    pub async fn owner_of(&mut self, id: RoasterId) -> Result<Option<UserId>> {
        let owner = sqlx::query_scalar::<_, UserId>("SELECT owner_id FROM roasters WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(owner)
    }
}
