//! Database repository for users.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserCredentials, UserDBResponse, UserUpdateDBRequest},
    },
    types::{Level, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

/// Columns making up a [`UserDBResponse`]. `password_hash` is deliberately absent.
const USER_COLUMNS: &str = "id, name, level, session_epoch, created_at, updated_at";

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub name: String,
    pub level: i64,
    pub session_epoch: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            level: Level::from(user.level),
            session_epoch: user.session_epoch,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct Credentials {
    id: UserId,
    password_hash: String,
}

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(name = %request.name, level = %request.level), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();

        // A new account starts a fresh epoch so nothing issued before it can ever match.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, password_hash, level, session_epoch, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.password_hash)
        .bind(i64::from(request.level.bits()))
        .bind(now.timestamp_millis().max(1))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                name = COALESCE(?, name),
                level = COALESCE(?, level),
                updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.name.as_deref())
        .bind(request.level.map(|level| i64::from(level.bits())))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Fetch the stored hash for a live account, for the login and password-change paths only.
    #[instrument(skip(self, name), err)]
    pub async fn get_credentials_by_name(&mut self, name: &str) -> Result<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash FROM users WHERE name = ? AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(credentials.map(|c| UserCredentials {
            id: c.id,
            password_hash: c.password_hash,
        }))
    }

    #[instrument(skip(self), err)]
    pub async fn get_credentials_by_id(&mut self, id: UserId) -> Result<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash FROM users WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(credentials.map(|c| UserCredentials {
            id: c.id,
            password_hash: c.password_hash,
        }))
    }

    /// Replace the password hash. Every session issued before this call stops resolving.
    #[instrument(skip(self, password_hash), err)]
    pub async fn set_password(&mut self, id: UserId, password_hash: &str) -> Result<UserDBResponse> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                password_hash = ?,
                session_epoch = MAX(?, session_epoch + 1),
                updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(password_hash)
        .bind(now.timestamp_millis())
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }

    /// Advance the revocation counter, invalidating every outstanding session token.
    ///
    /// The new value is `max(now_ms, previous + 1)`, so two revocations inside the same
    /// millisecond still produce distinct epochs.
    #[instrument(skip(self), err)]
    pub async fn revoke_sessions(&mut self, id: UserId) -> Result<UserDBResponse> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                session_epoch = MAX(?, session_epoch + 1),
                updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(now.timestamp_millis())
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }

    /// Number of live accounts.
    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Number of live accounts holding ADMIN without DISABLED.
    #[instrument(skip(self), err)]
    pub async fn count_active_admins(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND (level & ?) != 0 AND (level & ?) = 0",
        )
        .bind(i64::from(Level::ADMIN.bits()))
        .bind(i64::from(Level::DISABLED.bits()))
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}
