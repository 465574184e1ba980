//! Account management: admin creation, profile updates, password changes and session revocation.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::SqliteConnection;

use crate::{
    AppState,
    api::{
        handlers::auth::{create_account, validate_name},
        models::users::{ChangePasswordRequest, CurrentUser, UserCreate, UserResponse, UserUpdate},
    },
    auth::password::{self, Argon2Params},
    db::{
        handlers::{Repository, Users},
        models::users::{UserDBResponse, UserUpdateDBRequest},
    },
    errors::Error,
    types::{Level, UserId},
};

fn active_admin(level: Level) -> bool {
    level.is_admin() && !level.is_disabled()
}

/// Refuse a change that would leave no active admin behind.
async fn ensure_admin_remains(conn: &mut SqliteConnection, target: &UserDBResponse) -> Result<(), Error> {
    if active_admin(target.level) && Users::new(conn).count_active_admins().await? <= 1 {
        return Err(Error::Conflict {
            message: "Cannot remove the last active admin".to_string(),
        });
    }
    Ok(())
}

/// Change a password after checking confirmation, length and, when `current` is given, the old
/// password. Advances the session epoch.
pub(crate) async fn change_password_for(
    state: &AppState,
    user_id: UserId,
    current: Option<&str>,
    new_password: &str,
    new_password_confirm: &str,
) -> Result<UserDBResponse, Error> {
    if new_password != new_password_confirm {
        return Err(Error::BadRequest {
            message: "Passwords do not match".to_string(),
        });
    }
    password::validate_length(new_password, &state.config.auth.password)?;

    if let Some(current) = current {
        let credentials = {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            Users::new(&mut conn).get_credentials_by_id(user_id).await?
        }
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        })?;

        if !password::verify_password(current.to_string(), credentials.password_hash).await? {
            return Err(Error::BadRequest {
                message: "Current password is incorrect".to_string(),
            });
        }
    }

    let password_hash = password::hash_password(new_password.to_string(), Argon2Params::from(&state.config.auth.password)).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).set_password(user_id, &password_hash).await?;
    tracing::info!(user_id, "Password changed, sessions revoked");

    Ok(user)
}

/// Create an account (admin only)
#[utoipa::path(
    post,
    path = "/api/user",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Name already taken"),
    )
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    let level = request.level.unwrap_or(Level::MEMBER);
    let user = create_account(&state, &request.name, &request.password, level).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Fetch an account
#[utoipa::path(
    get,
    path = "/api/user/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Neither the account owner nor an admin"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// Rename an account or change its level
///
/// Changing the level requires ADMIN. Setting DISABLED also revokes the account's sessions.
#[utoipa::path(
    patch,
    path = "/api/user/{id}",
    request_body = UserUpdate,
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Name taken, or the last active admin would be removed"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = id, actor = current_user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    if request.level.is_some() && !current_user.is_admin() {
        return Err(Error::Forbidden {
            message: Some("Changing a level requires admin".to_string()),
        });
    }
    let name = request.name.as_deref().map(validate_name).transpose()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Users::new(&mut tx).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    if let Some(level) = request.level
        && !active_admin(level)
    {
        ensure_admin_remains(&mut tx, &existing).await?;
    }

    let mut user = Users::new(&mut tx)
        .update(
            id,
            &UserUpdateDBRequest {
                name,
                level: request.level,
            },
        )
        .await?;

    if let Some(level) = request.level
        && level.is_disabled()
        && !existing.level.is_disabled()
    {
        user = Users::new(&mut tx).revoke_sessions(id).await?;
        tracing::info!(user_id = id, "Account disabled, sessions revoked");
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(UserResponse::from(user)))
}

/// Change a password
///
/// Changing your own password requires `current_password`; an admin resetting someone
/// else's does not. Every outstanding session of the account is revoked.
#[utoipa::path(
    post,
    path = "/api/user/{id}/change-password",
    request_body = ChangePasswordRequest,
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid input or wrong current password"),
        (status = 403, description = "Neither the account owner nor an admin"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = id, actor = current_user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, Error> {
    let current = if current_user.id == id {
        Some(request.current_password.as_deref().ok_or_else(|| Error::BadRequest {
            message: "Current password is required".to_string(),
        })?)
    } else {
        None
    };

    change_password_for(&state, id, current, &request.new_password, &request.new_password_confirm).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Sign an account out everywhere
#[utoipa::path(
    post,
    path = "/api/user/{id}/force-logout",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "All sessions revoked"),
        (status = 403, description = "Neither the account owner nor an admin"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn force_logout(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut conn).revoke_sessions(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete an account (admin only)
#[utoipa::path(
    delete,
    path = "/api/user/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Last active admin"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<StatusCode, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Users::new(&mut tx).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;
    ensure_admin_remains(&mut tx, &existing).await?;
    Users::new(&mut tx).delete(id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
