//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLite connection (or transaction) and implements the
//! [`Repository`] trait, plus whatever entity-specific queries it needs.
//!
//! ```ignore
//! use barista::db::handlers::{Repository, Users};
//!
//! let mut conn = pool.acquire().await?;
//! let mut users = Users::new(&mut conn);
//! let user = users.get_by_id(1).await?;
//! ```

pub mod repository;
pub mod roasters;
pub mod users;

pub use repository::Repository;
pub use roasters::Roasters;
pub use users::Users;
