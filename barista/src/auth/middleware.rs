//! Per-route authorization gates.
//!
//! A [`Gate`] pairs a [`Policy`] with the [`RouteKind`] that decides how a denial is presented.
//! Mount it with `route_layer` so that it runs after routing and can see path parameters:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/user/{id}", get(get_user))
//!     .route_layer(from_fn_with_state(
//!         Gate::new(state.clone(), RouteKind::Api, Policy::OwnerOrAdmin(Arc::new(PathUserId))),
//!         gate,
//!     ))
//! ```
//!
//! On success the resolved [`CurrentUser`] is stored in the request extensions, where the
//! `CurrentUser` extractor picks it up.

use std::sync::Arc;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::current_user::resolve_session,
    db::handlers::Roasters,
    errors::Error,
    types::{Level, RoasterId, UserId},
};
use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, instrument, warn};

/// Where to send a browser that was turned away.
pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// How denials are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// JSON `{"error": ...}` with 401 or 403
    Api,
    /// 303 redirect to the login page or home page
    Ui,
}

/// Finds the user who owns the resource addressed by a request.
#[async_trait::async_trait]
pub trait ResourceOwner: Send + Sync {
    /// `None` when the resource cannot be identified or does not exist.
    async fn owner(&self, parts: &mut Parts, state: &AppState) -> Option<UserId>;
}

/// Who may pass a gate.
#[derive(Clone)]
pub enum Policy {
    /// Only requests without a valid session, e.g. the login page
    Guest,
    /// Any resolved identity
    LoggedIn,
    /// Identity must hold every bit of the level, or the level is `ANY`
    Level(Level),
    /// Admins, or the owner reported by the extractor
    OwnerOrAdmin(Arc<dyn ResourceOwner>),
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Guest => write!(f, "Guest"),
            Policy::LoggedIn => write!(f, "LoggedIn"),
            Policy::Level(level) => write!(f, "Level({level})"),
            Policy::OwnerOrAdmin(_) => write!(f, "OwnerOrAdmin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
}

impl Denial {
    pub fn into_response_for(self, kind: RouteKind) -> Response {
        match (kind, self) {
            (RouteKind::Api, Denial::Unauthenticated) => Error::Unauthenticated { message: None }.into_response(),
            (RouteKind::Api, Denial::Forbidden) => Error::Forbidden { message: None }.into_response(),
            (RouteKind::Ui, Denial::Unauthenticated) => Redirect::to(LOGIN_PATH).into_response(),
            (RouteKind::Ui, Denial::Forbidden) => Redirect::to(HOME_PATH).into_response(),
        }
    }
}

/// Decide whether a request passes `policy`.
///
/// Returns the identity to attach to the request. Guests pass with `None`.
#[instrument(skip_all, fields(policy = ?policy))]
pub async fn authorize(state: &AppState, policy: &Policy, parts: &mut Parts) -> Result<Option<CurrentUser>, Denial> {
    let user = resolve_session(parts, state).await;

    match policy {
        Policy::Guest => match user {
            None => Ok(None),
            Some(_) => Err(Denial::Forbidden),
        },
        Policy::LoggedIn => user.map(Some).ok_or(Denial::Unauthenticated),
        Policy::Level(required) => {
            let user = user.ok_or(Denial::Unauthenticated)?;
            if user.level.satisfies(*required) {
                Ok(Some(user))
            } else {
                debug!(user_id = user.id, level = %user.level, required = %required, "Insufficient level");
                Err(Denial::Forbidden)
            }
        }
        Policy::OwnerOrAdmin(extractor) => {
            let user = user.ok_or(Denial::Unauthenticated)?;
            if user.is_admin() {
                return Ok(Some(user));
            }
            match extractor.owner(parts, state).await {
                Some(owner) if owner == user.id => Ok(Some(user)),
                owner => {
                    debug!(user_id = user.id, ?owner, "Not the owner of the requested resource");
                    Err(Denial::Forbidden)
                }
            }
        }
    }
}

/// State for the [`gate`] middleware.
#[derive(Clone)]
pub struct Gate {
    state: AppState,
    kind: RouteKind,
    policy: Policy,
}

impl Gate {
    pub fn new(state: AppState, kind: RouteKind, policy: Policy) -> Self {
        Self { state, kind, policy }
    }
}

pub async fn gate(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    match authorize(&gate.state, &gate.policy, &mut parts).await {
        Ok(user) => {
            if let Some(user) = user {
                parts.extensions.insert(user);
            }
            next.run(Request::from_parts(parts, body)).await
        }
        Err(denial) => denial.into_response_for(gate.kind),
    }
}

/// Reads the `{id}` path parameter of a route.
async fn path_id(parts: &mut Parts, state: &AppState) -> Option<i64> {
    let params = RawPathParams::from_request_parts(parts, state).await.ok()?;
    params
        .iter()
        .find(|(name, _)| *name == "id")
        .and_then(|(_, value)| value.parse().ok())
}

/// For user-scoped routes: the user addressed by `{id}` owns themselves.
#[derive(Debug, Clone, Copy)]
pub struct PathUserId;

#[async_trait::async_trait]
impl ResourceOwner for PathUserId {
    async fn owner(&self, parts: &mut Parts, state: &AppState) -> Option<UserId> {
        path_id(parts, state).await
    }
}

/// For roaster routes: the roaster addressed by `{id}` belongs to whoever created it.
#[derive(Debug, Clone, Copy)]
pub struct RoasterOwner;

#[async_trait::async_trait]
impl ResourceOwner for RoasterOwner {
    async fn owner(&self, parts: &mut Parts, state: &AppState) -> Option<UserId> {
        let id: RoasterId = path_id(parts, state).await?;
        let mut conn = state
            .db
            .acquire()
            .await
            .inspect_err(|e| warn!("Could not acquire connection for ownership check: {e}"))
            .ok()?;
        Roasters::new(&mut conn)
            .owner_of(id)
            .await
            .inspect_err(|e| warn!(roaster_id = id, "Ownership lookup failed: {e}"))
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app_state, create_test_user, session_cookie_for, test_pool};
    use axum::{
        Router,
        http::{StatusCode, header},
        middleware::from_fn_with_state,
        routing::get,
    };
    use axum_test::TestServer;

    async fn whoami(user: CurrentUser) -> String {
        user.name
    }

    async fn hello() -> &'static str {
        "hello guest"
    }

    fn router(state: &AppState, kind: RouteKind, policy: Policy) -> Router {
        Router::new()
            .route("/guest", get(hello))
            .route("/user/{id}", get(whoami))
            .route("/whoami", get(whoami))
            .route_layer(from_fn_with_state(Gate::new(state.clone(), kind, policy), gate))
    }

    fn server(state: &AppState, kind: RouteKind, policy: Policy) -> TestServer {
        TestServer::new(router(state, kind, policy)).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_logged_in_gate() {
        let state = create_test_app_state(test_pool().await);
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let server = server(&state, RouteKind::Api, Policy::LoggedIn);

        server.get("/whoami").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/whoami")
            .add_header("cookie", session_cookie_for(&state, &alice))
            .await;
        response.assert_status_ok();
        response.assert_text("alice");
    }

    #[test_log::test(tokio::test)]
    async fn test_api_denial_is_json() {
        let state = create_test_app_state(test_pool().await);
        let server = server(&state, RouteKind::Api, Policy::LoggedIn);

        let response = server.get("/whoami").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    #[test_log::test(tokio::test)]
    async fn test_ui_denials_redirect() {
        let state = create_test_app_state(test_pool().await);
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        let server = server(&state, RouteKind::Ui, Policy::LoggedIn);
        let response = server.get("/whoami").await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(header::LOCATION), "/login");

        let server = self::server(&state, RouteKind::Ui, Policy::Level(Level::ADMIN));
        let response = server
            .get("/whoami")
            .add_header("cookie", session_cookie_for(&state, &alice))
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(header::LOCATION), "/");
    }

    #[test_log::test(tokio::test)]
    async fn test_guest_gate() {
        let state = create_test_app_state(test_pool().await);
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let server = server(&state, RouteKind::Api, Policy::Guest);

        server.get("/guest").await.assert_status_ok();
        server
            .get("/guest")
            .add_header("cookie", session_cookie_for(&state, &alice))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // A revoked session is no identity, so the guest page is reachable again
        let cookie = session_cookie_for(&state, &alice);
        let mut conn = state.db.acquire().await.unwrap();
        crate::db::handlers::Users::new(&mut conn).revoke_sessions(alice.id).await.unwrap();
        drop(conn);
        server.get("/guest").add_header("cookie", cookie).await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_level_gate() {
        let state = create_test_app_state(test_pool().await);
        let member = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let admin = create_test_user(&state.db, "root", "p2", Level::ADMIN | Level::MEMBER).await;
        let server = server(&state, RouteKind::Api, Policy::Level(Level::ADMIN));

        server
            .get("/whoami")
            .add_header("cookie", session_cookie_for(&state, &member))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/whoami")
            .add_header("cookie", session_cookie_for(&state, &admin))
            .await
            .assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_level_any_admits_every_identity() {
        let state = create_test_app_state(test_pool().await);
        let bare = create_test_user(&state.db, "bare", "p1", Level::NONE).await;
        let server = server(&state, RouteKind::Api, Policy::Level(Level::ANY));

        server
            .get("/whoami")
            .add_header("cookie", session_cookie_for(&state, &bare))
            .await
            .assert_status_ok();
        server.get("/whoami").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_owner_or_admin_path_user() {
        let state = create_test_app_state(test_pool().await);
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let bob = create_test_user(&state.db, "bob", "p2", Level::MEMBER).await;
        let admin = create_test_user(&state.db, "root", "p3", Level::ADMIN).await;
        let server = server(&state, RouteKind::Api, Policy::OwnerOrAdmin(Arc::new(PathUserId)));

        let alice_cookie = session_cookie_for(&state, &alice);

        // Own record
        server
            .get(&format!("/user/{}", alice.id))
            .add_header("cookie", alice_cookie.clone())
            .await
            .assert_status_ok();
        // Someone else's
        server
            .get(&format!("/user/{}", bob.id))
            .add_header("cookie", alice_cookie.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        // Unparsable id
        server
            .get("/user/not-a-number")
            .add_header("cookie", alice_cookie)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        // Admin may act on anyone
        server
            .get(&format!("/user/{}", bob.id))
            .add_header("cookie", session_cookie_for(&state, &admin))
            .await
            .assert_status_ok();
        // Nobody at all
        server
            .get(&format!("/user/{}", alice.id))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_policy_debug() {
        assert_eq!(format!("{:?}", Policy::Level(Level::ADMIN)), "Level(Admin)");
        assert_eq!(format!("{:?}", Policy::OwnerOrAdmin(Arc::new(PathUserId))), "OwnerOrAdmin");
    }
}
