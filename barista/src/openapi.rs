//! OpenAPI document for the JSON API, served at `/api/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, errors::ErrorResponse, types::Level};

/// Session cookie authentication.
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "bs",
                    "Session token set by `POST /api/auth/login`. The cookie name is configurable.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionCookieAddon),
    security(("SessionCookie" = [])),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::change_password,
        api::handlers::users::force_logout,
        api::handlers::users::delete_user,
        api::handlers::roasters::list_roasters,
        api::handlers::roasters::create_roaster,
        api::handlers::roasters::get_roaster,
        api::handlers::roasters::update_roaster,
        api::handlers::roasters::delete_roaster,
    ),
    components(schemas(
        Level,
        ErrorResponse,
        api::models::auth::RegistrationInfo,
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::auth::AuthSuccessResponse,
        api::models::users::CurrentUser,
        api::models::users::UserCreate,
        api::models::users::UserUpdate,
        api::models::users::ChangePasswordRequest,
        api::models::users::UserResponse,
        api::models::roasters::RoasterRequest,
        api::models::roasters::RoasterResponse,
    )),
    tags(
        (name = "authentication", description = "Registration, login and logout"),
        (name = "users", description = "Account management"),
        (name = "roasters", description = "Coffee roasters"),
    ),
    info(
        title = "Barista API",
        description = "Coffee tracking with cookie sessions",
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for path in [
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/logout",
            "/api/me",
            "/api/user",
            "/api/user/{id}",
            "/api/user/{id}/change-password",
            "/api/user/{id}/force-logout",
            "/api/roasters",
            "/api/roaster",
            "/api/roaster/{id}",
        ] {
            assert!(paths.contains(&path), "missing {path}");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("SessionCookie"));
    }
}
