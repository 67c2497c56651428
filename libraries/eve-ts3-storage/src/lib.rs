//! EVE TS3 Storage
//!
//! `SQLite` persistence for TS3 users.
//!
//! Queries live in the [`users`] slice as free functions over a pool;
//! [`SqliteUserStore`] exposes them through the core [`UserStore`] trait so
//! the sync engine never touches SQL directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use eve_ts3_storage::{create_pool, run_migrations, SqliteUserStore};
//! use eve_ts3_core::UserStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://eve-ts3.db").await?;
//! run_migrations(&pool).await?;
//!
//! let store = SqliteUserStore::new(pool);
//! let ids = store.active_character_ids().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`UserStore`]: eve_ts3_core::UserStore

mod context;
mod error;

pub mod users;

pub use context::SqliteUserStore;
pub use error::StorageError;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://eve-ts3.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!(url = %database_url, "Creating database pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::debug!("Database pool created");

    Ok(pool)
}
