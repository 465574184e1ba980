//! API request/response models for authentication.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::UserResponse;

/// Registration information
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationInfo {
    /// Whether self-registration is enabled
    pub enabled: bool,
    pub message: String,
}

/// Request to register a new account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Login name (unique, case-insensitive)
    pub name: String,
    pub password: String,
    /// Must equal `password`
    pub password_confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Response after successful login or registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Registration does not sign the new account in, so there is no cookie here.
pub struct RegisterResponse {
    pub auth_response: AuthResponse,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.auth_response)).into_response()
    }
}

pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            AppendHeaders([(header::SET_COOKIE, self.cookie)]),
            Json(self.auth_response),
        )
            .into_response()
    }
}

pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            AppendHeaders([(header::SET_COOKIE, self.cookie)]),
            Json(self.auth_response),
        )
            .into_response()
    }
}
