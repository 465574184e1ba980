//! HTTP request handlers.
//!
//! Handlers never authorize on their own. The gate mounted on each route group decides who
//! gets through and attaches the [`crate::api::models::users::CurrentUser`] the handlers read.
//!
//! - [`auth`]: registration, login, logout and the current identity
//! - [`users`]: account management
//! - [`roasters`]: roaster CRUD
//! - [`pages`]: HTML pages and their forms

pub mod auth;
pub mod pages;
pub mod roasters;
pub mod users;
