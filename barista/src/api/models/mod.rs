//! API request and response data models.
//!
//! These define the public JSON contract and are distinct from the storage models in
//! [`crate::db::models`]. Every type is annotated for the OpenAPI document.
//!
//! - [`auth`]: registration, login and logout
//! - [`users`]: accounts and the request identity ([`users::CurrentUser`])
//! - [`roasters`]: coffee roasters

pub mod auth;
pub mod roasters;
pub mod users;
