//! HTTP layer: route handlers and their request/response models.
//!
//! - **[`handlers`]**: Axum handlers, grouped by resource
//! - **[`models`]**: JSON request/response types
//!
//! # Routes
//!
//! - **Authentication** (`/api/auth/*`, `/api/me`): registration, login, logout
//! - **Users** (`/api/user/*`): account management and session revocation
//! - **Roasters** (`/api/roasters`, `/api/roaster/*`): roaster CRUD
//! - **Pages** (`/`, `/login`, `/register`, `/settings`, `/logout`): server-rendered HTML
//!
//! Every JSON endpoint is annotated with `utoipa`; the document is served at
//! `/api/openapi.json`. Authorization is applied per route group in [`crate::build_router`].

pub mod handlers;
pub mod models;
