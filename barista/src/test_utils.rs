//! Shared helpers for unit and integration tests.

use crate::{
    AppState,
    auth::{
        password::{self, Argon2Params},
        session::{SessionClaims, encode_session_token},
    },
    config::{Config, PasswordConfig},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    templates::Templates,
    types::Level,
};
use axum_test::TestServer;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;

/// A migrated in-memory database.
///
/// A single connection that is never recycled, since every new in-memory connection would
/// be a fresh empty database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    crate::migrator().run(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    // Cheap hashing keeps the suite fast
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config
}

pub fn create_test_app_state(pool: SqlitePool) -> AppState {
    create_test_app_state_with_config(pool, create_test_config())
}

pub fn create_test_app_state_with_config(pool: SqlitePool, config: Config) -> AppState {
    AppState::builder()
        .db(pool)
        .config(config)
        .templates(Arc::new(Templates::new().expect("Failed to load templates")))
        .build()
}

/// Router for the whole application, on top of a fresh in-memory database.
pub async fn create_test_app(config: Config) -> (TestServer, AppState) {
    let state = create_test_app_state_with_config(test_pool().await, config);
    let router = crate::build_router(state.clone());
    (TestServer::new(router).expect("Failed to start test server"), state)
}

pub async fn create_test_user(pool: &SqlitePool, name: &str, password: &str, level: Level) -> UserDBResponse {
    let params = Argon2Params::from(&create_test_config().auth.password);
    let password_hash = password::hash_string_with_params(password, params).expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name: name.to_string(),
            password_hash,
            level,
        })
        .await
        .expect("Failed to create test user")
}

/// A `Cookie` request header value carrying a fresh session for `user`.
pub fn session_cookie_for(state: &AppState, user: &UserDBResponse) -> String {
    let claims = SessionClaims::for_user(user, state.config.auth.security.jwt_expiry);
    let secret = state.config.secret_key.as_deref().expect("test config has a secret");
    let token = encode_session_token(&claims, secret).expect("Failed to encode session token");
    format!("{}={}", state.config.auth.session.cookie_name, token)
}

/// Pull the `name=value` pair out of a `Set-Cookie` header so it can be replayed as `Cookie`.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}
