//! Database layer for data persistence and access.
//!
//! SQLite through SQLx, organised with the Repository pattern:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers, auth middleware)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! Repositories borrow a connection. Use a transaction when several statements must agree
//! (for example checking the admin count before demoting):
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut users = Users::new(&mut tx);
//! // ... operations ...
//! tx.commit().await?;
//! ```
//!
//! Migrations live in `migrations/` and are embedded through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::config::DatabaseConfig;

/// Open the connection pool described by the configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
}
