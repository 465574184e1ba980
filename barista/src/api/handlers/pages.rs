//! Server-rendered pages.
//!
//! Forms post back to the same path. Client-side failures re-render the form with the error
//! message; anything else falls through to the JSON error response.

use axum::{
    Form,
    extract::State,
    http::header,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use minijinja::{Value, context};

use crate::{
    AppState,
    api::{
        handlers::{
            auth::{authenticate, register_account},
            users::change_password_for,
        },
        models::{
            auth::{LoginRequest, RegisterRequest},
            roasters::DEFAULT_LIMIT,
            users::{ChangePasswordRequest, CurrentUser},
        },
    },
    auth::{
        middleware::{HOME_PATH, LOGIN_PATH},
        session,
    },
    db::handlers::{Repository, Roasters, Users, roasters::RoasterFilter},
    errors::Error,
};

fn render(state: &AppState, template: &str, ctx: Value) -> Response {
    match state.templates.render(template, ctx) {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Re-render `template` with the error inline, keeping the error's status.
fn render_with_error(state: &AppState, template: &str, ctx: Value, error: Error) -> Response {
    let status = error.status_code();
    if !status.is_client_error() {
        return error.into_response();
    }
    let ctx = context! { error => error.user_message(), ..ctx };
    match state.templates.render(template, ctx) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>) -> Response {
    render(
        &state,
        "login.html",
        context! { allow_registration => state.config.auth.allow_registration },
    )
}

#[tracing::instrument(skip_all, fields(name = %form.name))]
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginRequest>) -> Response {
    match authenticate(&state, &form.name, &form.password).await {
        Ok((_, cookie)) => (AppendHeaders([(header::SET_COOKIE, cookie)]), Redirect::to(HOME_PATH)).into_response(),
        Err(e) => render_with_error(
            &state,
            "login.html",
            context! { name => form.name, allow_registration => state.config.auth.allow_registration },
            e,
        ),
    }
}

#[tracing::instrument(skip_all)]
pub async fn register_page(State(state): State<AppState>) -> Response {
    render(
        &state,
        "register.html",
        context! { allow_registration => state.config.auth.allow_registration },
    )
}

#[tracing::instrument(skip_all, fields(name = %form.name))]
pub async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterRequest>) -> Response {
    match register_account(&state, &form).await {
        Ok(_) => Redirect::to(LOGIN_PATH).into_response(),
        Err(e) => render_with_error(
            &state,
            "register.html",
            context! { name => form.name, allow_registration => state.config.auth.allow_registration },
            e,
        ),
    }
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub async fn home(State(state): State<AppState>, user: CurrentUser) -> Result<Response, Error> {
    let roasters = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Roasters::new(&mut conn)
            .list(&RoasterFilter {
                owner_id: Some(user.id),
                skip: 0,
                limit: DEFAULT_LIMIT,
            })
            .await?
    };

    let roasters: Vec<Value> = roasters
        .into_iter()
        .map(|r| context! { name => r.name, website => r.website, description => r.description })
        .collect();

    Ok(render(&state, "home.html", context! { user, roasters }))
}

async fn settings_context(state: &AppState, user: &CurrentUser) -> Result<Value, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let record = Users::new(&mut conn).get_by_id(user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user.id.to_string(),
    })?;

    Ok(context! {
        user => user.clone(),
        level => record.level.to_string(),
        created_at => record.created_at.format("%Y-%m-%d").to_string(),
    })
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub async fn settings(State(state): State<AppState>, user: CurrentUser) -> Result<Response, Error> {
    let ctx = settings_context(&state, &user).await?;
    Ok(render(&state, "settings.html", ctx))
}

/// Change your own password from the settings page.
///
/// The epoch advance revokes the session that made the request too, so a fresh cookie is
/// issued alongside the confirmation.
#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub async fn settings_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ChangePasswordRequest>,
) -> Result<Response, Error> {
    let current = form.current_password.as_deref().unwrap_or_default();
    let result = change_password_for(&state, user.id, Some(current), &form.new_password, &form.new_password_confirm).await;

    let ctx = settings_context(&state, &user).await?;
    match result {
        Ok(updated) => {
            let claims = session::SessionClaims::for_user(&updated, state.config.auth.security.jwt_expiry);
            let token = session::encode_session_token(&claims, session::signing_secret(&state.config)?)?;
            let cookie = session::session_cookie(&token, &state.config.auth.session);
            let page = render(&state, "settings.html", context! { notice => "Password changed", ..ctx });
            Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), page).into_response())
        }
        Err(e) => Ok(render_with_error(&state, "settings.html", ctx, e)),
    }
}

#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie(&state.config.auth.session))]),
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::{
        test_utils::{cookie_pair, create_test_app, create_test_config, create_test_user, session_cookie_for},
        types::Level,
    };
    use axum::http::StatusCode;

    #[test_log::test(tokio::test)]
    async fn test_pages_redirect_guests_to_login() {
        let (server, _state) = create_test_app(create_test_config()).await;

        for path in ["/", "/settings"] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::SEE_OTHER);
            assert_eq!(response.header("location"), "/login");
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_login_page_redirects_signed_in_users_home() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        let response = server.get("/login").add_header("cookie", session_cookie_for(&state, &alice)).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");

        server.get("/login").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_login_form() {
        let (server, state) = create_test_app(create_test_config()).await;
        create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        let response = server
            .post("/login")
            .form(&[("name", "alice"), ("password", "wrong")])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.text().contains("Invalid name or password"));

        let response = server.post("/login").form(&[("name", "alice"), ("password", "p1")]).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");
        let cookie = cookie_pair(response.header("set-cookie").to_str().unwrap());

        let home = server.get("/").add_header("cookie", cookie).await;
        home.assert_status_ok();
        assert!(home.text().contains("alice"));
    }

    #[test_log::test(tokio::test)]
    async fn test_register_form() {
        let mut config = create_test_config();
        config.auth.allow_registration = true;
        let (server, _state) = create_test_app(config).await;

        let response = server
            .post("/register")
            .form(&[("name", "alice"), ("password", "p1"), ("password_confirm", "p2")])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("Passwords do not match"));

        let response = server
            .post("/register")
            .form(&[("name", "alice"), ("password", "p1"), ("password_confirm", "p1")])
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/login");
        assert!(response.maybe_header("set-cookie").is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_settings_password_reissues_cookie() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let old_cookie = session_cookie_for(&state, &alice);

        let response = server
            .post("/settings/password")
            .add_header("cookie", old_cookie.clone())
            .form(&[("current_password", "p1"), ("new_password", "p2"), ("new_password_confirm", "p2")])
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("Password changed"));
        let new_cookie = cookie_pair(response.header("set-cookie").to_str().unwrap());

        server.get("/settings").add_header("cookie", old_cookie).await.assert_status(StatusCode::SEE_OTHER);
        server.get("/settings").add_header("cookie", new_cookie).await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_page() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        let response = server.post("/logout").add_header("cookie", session_cookie_for(&state, &alice)).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/login");
        assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
    }
}
