//! Authentication and authorization.
//!
//! Sessions are stateless JWTs carried in an `HttpOnly` cookie. Each user row has a
//! `session_epoch`; a token is accepted only while its `epoch` claim equals the live value, so
//! advancing the epoch revokes every outstanding session of that user at once.
//!
//! # Modules
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`session`]: token encoding/decoding and the session cookie
//! - [`current_user`]: resolving a request's cookie to a live [`CurrentUser`] and the handler
//!   extractor
//! - [`middleware`]: per-route policies (guest, logged in, level, owner-or-admin)
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use barista::api::models::users::CurrentUser;
//!
//! async fn protected_handler(user: CurrentUser) -> String {
//!     format!("Hello, {}!", user.name)
//! }
//! ```
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod session;
