//! Registration, login and logout.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
            RegistrationInfo,
        },
        users::{CurrentUser, UserResponse},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    errors::Error,
    types::Level,
};

/// Trim and check a login name.
pub(crate) fn validate_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Name is required".to_string(),
        });
    }
    if name.chars().count() > 64 {
        return Err(Error::BadRequest {
            message: "Name must be at most 64 characters".to_string(),
        });
    }
    Ok(name.to_string())
}

/// Validate, hash and store a new account. Shared by every path that creates users.
pub(crate) async fn create_account(state: &AppState, name: &str, password: &str, level: Level) -> Result<UserDBResponse, Error> {
    let name = validate_name(name)?;
    password::validate_length(password, &state.config.auth.password)?;

    let password_hash = password::hash_password(password.to_string(), Argon2Params::from(&state.config.auth.password)).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name,
            password_hash,
            level,
        })
        .await?;

    Ok(user)
}

/// Self-registration: checks the feature flag and password confirmation, creates a MEMBER.
pub(crate) async fn register_account(state: &AppState, request: &RegisterRequest) -> Result<UserDBResponse, Error> {
    if !state.config.auth.allow_registration {
        return Err(Error::Forbidden {
            message: Some("User registration is disabled".to_string()),
        });
    }

    if request.password != request.password_confirm {
        return Err(Error::BadRequest {
            message: "Passwords do not match".to_string(),
        });
    }

    create_account(state, &request.name, &request.password, Level::MEMBER).await
}

/// Check credentials and mint a session. Returns the user and the `Set-Cookie` value.
///
/// Unknown names, wrong passwords and disabled accounts are indistinguishable to the caller.
pub(crate) async fn authenticate(state: &AppState, name: &str, password: &str) -> Result<(UserDBResponse, String), Error> {
    let (credentials, user) = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut users = Users::new(&mut conn);

        let Some(credentials) = users.get_credentials_by_name(name.trim()).await? else {
            password::verify_password(password.to_string(), state.decoy_hash().await?).await?;
            return Err(Error::InvalidCredentials);
        };
        let user = users.get_by_id(credentials.id).await?.ok_or(Error::InvalidCredentials)?;
        (credentials, user)
    };

    if !password::verify_password(password.to_string(), credentials.password_hash).await? {
        return Err(Error::InvalidCredentials);
    }

    if user.level.is_disabled() {
        tracing::info!(user_id = user.id, "Login refused for disabled account");
        return Err(Error::InvalidCredentials);
    }

    let claims = session::SessionClaims::for_user(&user, state.config.auth.security.jwt_expiry);
    let token = session::encode_session_token(&claims, session::signing_secret(&state.config)?)?;
    let cookie = session::session_cookie(&token, &state.config.auth.session);

    Ok((user, cookie))
}

/// Get registration information
#[utoipa::path(
    get,
    path = "/api/auth/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Json<RegistrationInfo> {
    let enabled = state.config.auth.allow_registration;
    Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    })
}

/// Register a new account
///
/// The new account is not signed in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Registration disabled, or already signed in"),
        (status = 409, description = "Name already taken"),
    )
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    let user = register_account(&state, &request).await?;

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            message: "Registration successful".to_string(),
        },
    })
}

/// Login with name and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Already signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let (user, cookie) = authenticate(&state, &request.name, &request.password).await?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear the session cookie)
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> LogoutResponse {
    LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config.auth.session),
    }
}

/// The signed-in user
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub async fn me(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{auth::AuthResponse, users::CurrentUser},
        test_utils::{cookie_pair, create_test_app, create_test_config, create_test_user},
        types::Level,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn registration_enabled() -> crate::config::Config {
        let mut config = create_test_config();
        config.auth.allow_registration = true;
        config
    }

    #[test_log::test(tokio::test)]
    async fn test_register_success_does_not_log_in() {
        let (server, _state) = create_test_app(registration_enabled()).await;

        let response = server
            .post("/api/auth/register")
            .json(&json!({ "name": "alice", "password": "p1", "password_confirm": "p1" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert!(response.maybe_header("set-cookie").is_none());
        let body: AuthResponse = response.json();
        assert_eq!(body.user.name, "alice");
        assert_eq!(body.user.level, Level::MEMBER);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_name_still_verifies_a_hash() {
        let (server, state) = create_test_app(create_test_config()).await;

        server
            .post("/api/auth/login")
            .json(&json!({ "name": "nobody", "password": "p1" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // The login itself built the decoy, under the configured params
        assert!(state.decoy_hash.get().is_some());
        let decoy = state.decoy_hash().await.unwrap();
        assert!(decoy.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"), "{decoy}");
        assert!(!crate::auth::password::verify_string("p1", &decoy));

        // Built once and reused
        assert_eq!(state.decoy_hash().await.unwrap(), decoy);
    }

    #[test_log::test(tokio::test)]
    async fn test_register_disabled() {
        let (server, _state) = create_test_app(create_test_config()).await;

        server
            .post("/api/auth/register")
            .json(&json!({ "name": "alice", "password": "p1", "password_confirm": "p1" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let info: serde_json::Value = server.get("/api/auth/register").await.json();
        assert_eq!(info["enabled"], false);
    }

    #[test_log::test(tokio::test)]
    async fn test_register_validation() {
        let (server, state) = create_test_app(registration_enabled()).await;
        create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        // Mismatched confirmation
        server
            .post("/api/auth/register")
            .json(&json!({ "name": "bob", "password": "p1", "password_confirm": "p2" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Blank name
        server
            .post("/api/auth/register")
            .json(&json!({ "name": "  ", "password": "p1", "password_confirm": "p1" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Taken, case-insensitively
        let response = server
            .post("/api/auth/register")
            .json(&json!({ "name": "Alice", "password": "p1", "password_confirm": "p1" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "This name is already taken");
    }

    #[test_log::test(tokio::test)]
    async fn test_login_sets_session_cookie() {
        let (server, state) = create_test_app(create_test_config()).await;
        create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "name": "alice", "password": "p1" }))
            .await;

        response.assert_status_ok();
        let set_cookie = response.header("set-cookie");
        let set_cookie = set_cookie.to_str().unwrap();
        assert!(set_cookie.starts_with("bs="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Path=/"));
        assert!(!set_cookie.contains("Domain"));

        let me: CurrentUser = server
            .get("/api/me")
            .add_header("cookie", cookie_pair(set_cookie))
            .await
            .json();
        assert_eq!(me.name, "alice");
    }

    #[test_log::test(tokio::test)]
    async fn test_login_failures_are_indistinguishable() {
        let (server, state) = create_test_app(create_test_config()).await;
        create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        create_test_user(&state.db, "mallory", "p2", Level::MEMBER | Level::DISABLED).await;

        let attempts = [
            json!({ "name": "alice", "password": "wrong" }),
            json!({ "name": "nobody", "password": "p1" }),
            json!({ "name": "mallory", "password": "p2" }),
        ];

        for attempt in attempts {
            let response = server.post("/api/auth/login").json(&attempt).await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = response.json();
            assert_eq!(body["error"], "Invalid name or password");
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_login_while_logged_in_is_forbidden() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        server
            .post("/api/auth/login")
            .add_header("cookie", crate::test_utils::session_cookie_for(&state, &alice))
            .json(&json!({ "name": "alice", "password": "p1" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_clears_cookie() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        server.post("/api/auth/logout").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/auth/logout")
            .add_header("cookie", crate::test_utils::session_cookie_for(&state, &alice))
            .await;
        response.assert_status_ok();
        assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
    }
}
