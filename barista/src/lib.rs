//! # barista: coffee tracking with cookie sessions
//!
//! `barista` is a small web application for keeping track of coffee roasters. It serves a JSON
//! API and a handful of server-rendered pages from one [Axum](https://github.com/tokio-rs/axum)
//! router, backed by SQLite.
//!
//! ## Sessions
//!
//! A successful login sets an `HttpOnly` cookie holding an HS256-signed JWT. The token carries
//! the user's id and the value of their `session_epoch` at issue time. On every gated request
//! the token is decoded, the user is loaded from the database, and the token is accepted only
//! if the epochs still match. Changing a password, disabling an account or calling
//! force-logout advances the epoch, which revokes every outstanding session of that user
//! without any server-side session store.
//!
//! ## Authorization
//!
//! Permissions are a bitmask ([`types::Level`]). Each route group in [`build_router`] is wrapped
//! in an [`auth::middleware::Gate`] that applies one policy:
//!
//! - **Guest**: only requests without a session (login and registration)
//! - **Logged in**: any live session
//! - **Level**: the user must hold every required bit
//! - **Owner or admin**: admins, or the user who owns the addressed resource
//!
//! API routes answer denials with a JSON error; page routes redirect to `/login` or `/`.
//!
//! ## Getting Started
//!
//! ```bash
//! BARISTA_SECRET_KEY=change-me cargo run -- -f config.yaml
//! ```
//!
//! On first start with an empty database an admin account is created from `admin_name` and
//! `admin_password`.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod templates;
#[cfg(test)]
mod test_utils;
pub mod types;

use std::sync::{Arc, OnceLock};

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use bon::Builder;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level as TraceLevel, debug, info, instrument, warn};
use utoipa::OpenApi;

pub use config::Config;
pub use types::{RoasterId, UserId};

use crate::{
    api::handlers::{auth as auth_handlers, pages, roasters, users},
    auth::{
        middleware::{Gate, PathUserId, Policy, RoasterOwner, RouteKind, gate},
        password::{self, Argon2Params},
    },
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    openapi::ApiDoc,
    templates::Templates,
    types::Level,
};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .templates(Arc::new(Templates::new()?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub templates: Arc<Templates>,
    /// Hash verified against when a login names no account, built on first use
    #[builder(default)]
    decoy_hash: Arc<OnceLock<String>>,
}

impl AppState {
    /// A PHC hash of a random password under the configured argon2 parameters.
    ///
    /// Logins for unknown names verify against this so they cost the same as a wrong password.
    pub async fn decoy_hash(&self) -> Result<String, errors::Error> {
        if let Some(hash) = self.decoy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = password::hash_password(uuid::Uuid::new_v4().to_string(), Argon2Params::from(&self.config.auth.password)).await?;
        Ok(self.decoy_hash.get_or_init(|| hash).clone())
    }
}

/// Get the barista database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the bootstrap admin account when the database has no users at all.
///
/// Returns the new user's id, or `None` when users already exist or no password is
/// configured. An existing database is never touched, so changing `admin_password` later has
/// no effect.
#[instrument(skip_all, fields(name = %name))]
pub async fn create_initial_admin_user(
    name: &str,
    password: Option<&str>,
    params: Argon2Params,
    db: &SqlitePool,
) -> anyhow::Result<Option<UserId>> {
    let mut tx = db.begin().await?;

    if Users::new(&mut tx).count().await? > 0 {
        debug!("Users exist, skipping admin bootstrap");
        return Ok(None);
    }

    let Some(password) = password else {
        warn!("Database has no users and no admin_password is configured; nobody can log in");
        return Ok(None);
    };

    let password_hash = password::hash_password(password.to_string(), params).await?;
    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            name: name.to_string(),
            password_hash,
            level: Level::ADMIN | Level::MEMBER,
        })
        .await?;

    tx.commit().await?;
    info!(user_id = user.id, "Created initial admin user");
    Ok(Some(user.id))
}

/// Wrap every route of `router` in a gate enforcing `policy`.
fn gated(router: Router<AppState>, state: &AppState, kind: RouteKind, policy: Policy) -> Router<AppState> {
    router.route_layer(from_fn_with_state(Gate::new(state.clone(), kind, policy), gate))
}

/// Build the application router with every route and its authorization gate.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/api/auth/register", get(auth_handlers::get_registration_info));

    let api_guest = gated(
        Router::new()
            .route("/api/auth/register", post(auth_handlers::register))
            .route("/api/auth/login", post(auth_handlers::login)),
        &state,
        RouteKind::Api,
        Policy::Guest,
    );

    let api_logged_in = gated(
        Router::new()
            .route("/api/auth/logout", post(auth_handlers::logout))
            .route("/api/me", get(auth_handlers::me))
            .route("/api/roasters", get(roasters::list_roasters))
            .route("/api/roaster", post(roasters::create_roaster))
            .route("/api/roaster/{id}", get(roasters::get_roaster)),
        &state,
        RouteKind::Api,
        Policy::LoggedIn,
    );

    let api_admin = gated(
        Router::new()
            .route("/api/user", post(users::create_user))
            .route("/api/user/{id}", delete(users::delete_user)),
        &state,
        RouteKind::Api,
        Policy::Level(Level::ADMIN),
    );

    let api_account_owner = gated(
        Router::new()
            .route("/api/user/{id}", get(users::get_user).patch(users::update_user))
            .route("/api/user/{id}/change-password", post(users::change_password))
            .route("/api/user/{id}/force-logout", post(users::force_logout)),
        &state,
        RouteKind::Api,
        Policy::OwnerOrAdmin(Arc::new(PathUserId)),
    );

    let api_roaster_owner = gated(
        Router::new().route(
            "/api/roaster/{id}",
            put(roasters::update_roaster).delete(roasters::delete_roaster),
        ),
        &state,
        RouteKind::Api,
        Policy::OwnerOrAdmin(Arc::new(RoasterOwner)),
    );

    let ui_guest = gated(
        Router::new()
            .route("/login", get(pages::login_page).post(pages::login_submit))
            .route("/register", get(pages::register_page).post(pages::register_submit)),
        &state,
        RouteKind::Ui,
        Policy::Guest,
    );

    let ui_logged_in = gated(
        Router::new()
            .route("/", get(pages::home))
            .route("/settings", get(pages::settings))
            .route("/settings/password", post(pages::settings_password))
            .route("/logout", post(pages::logout)),
        &state,
        RouteKind::Ui,
        Policy::LoggedIn,
    );

    Router::new()
        .merge(public)
        .merge(api_guest)
        .merge(api_logged_in)
        .merge(api_admin)
        .merge(api_account_owner)
        .merge(api_roaster_owner)
        .merge(ui_guest)
        .merge(ui_logged_in)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(TraceLevel::INFO))
                .on_request(DefaultOnRequest::new().level(TraceLevel::INFO))
                .on_response(DefaultOnResponse::new().level(TraceLevel::INFO)),
        )
}

/// Main application struct that owns the router and its resources.
///
/// 1. **Create**: [`Application::new`] opens the database, runs migrations and bootstraps the
///    admin account
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool
///    is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(host = %config.host, port = config.port, database = %config.database.url, "Starting barista");

        let pool = db::connect(&config.database).await?;
        migrator().run(&pool).await?;

        create_initial_admin_user(
            &config.admin_name,
            config.admin_password.as_deref(),
            Argon2Params::from(&config.auth.password),
            &pool,
        )
        .await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .templates(Arc::new(Templates::new()?))
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Barista listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
