//! Resolving the session cookie to a live identity, and the handler-side extractor.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, SessionClaims},
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace, warn};

/// Every value of the named cookie in the request, in header order.
fn session_tokens<'a>(parts: &'a Parts, cookie_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(move |cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == cookie_name && !value.is_empty()).then_some(value)
        })
}

/// Resolve the request's session cookie to the current user, or nothing.
///
/// The token must decode under the configured secret, and its epoch must equal the live
/// user's revocation counter. Missing, deleted and revoked accounts all resolve to `None`, as
/// does any store failure (logged, never retried).
#[instrument(skip_all)]
pub async fn resolve_session(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let Some(secret) = state.config.secret_key.as_deref() else {
        warn!("No secret_key configured; every session is rejected");
        return None;
    };

    let candidates: Vec<SessionClaims> = session_tokens(parts, &state.config.auth.session.cookie_name)
        .filter_map(|token| {
            session::decode_session_token(token, secret)
                .inspect_err(|e| trace!("Session token rejected: {e}"))
                .ok()
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut conn = match state.db.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Could not acquire connection to resolve session: {e}");
            return None;
        }
    };

    // Duplicate cookies from other paths may be stale; the first one that is still live wins.
    for claims in candidates {
        let user = match Users::new(&mut conn).get_by_id(claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user_id = claims.sub, "Session refers to a missing or deleted user");
                continue;
            }
            Err(e) => {
                warn!(user_id = claims.sub, "Failed to load session user: {e}");
                return None;
            }
        };

        if user.session_epoch != claims.epoch {
            debug!(user_id = user.id, "Session token has been revoked");
            continue;
        }

        return Some(CurrentUser::from(user));
    }

    None
}

/// Reads the identity an authorization gate attached to the request.
///
/// Fails closed: a handler mounted without a gate sees 401, never an anonymous user.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
