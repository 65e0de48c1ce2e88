//! DooDates database crate
//!
//! Connection preparation and embedded migrations for the SQLite store that
//! backs polls, votes and AI conversations.

use doodates_config::DatabaseConfig;
use sqlx::SqlitePool;
use tracing::error;

pub mod connection;
pub mod migrations;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::run_migrations;
pub use types::{DatabaseError, DatabaseResult};

pub use sqlx::SqlitePool as Pool;

/// Connect and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config).await.map_err(|e| {
        error!(error = %e, url = %config.url, "database connection failed");
        DatabaseError::connection(format!("{e:#}"))
    })?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::migration(format!("{e:#}")))?;

    Ok(pool)
}
