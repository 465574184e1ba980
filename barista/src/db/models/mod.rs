//! Database record models matching table schemas.
//!
//! These structs are what repositories accept and return. They are kept separate from the API
//! models in [`crate::api::models`] so that storage and wire formats can evolve independently;
//! in particular the user password hash exists only in [`users::UserCredentials`].

pub mod roasters;
pub mod users;
