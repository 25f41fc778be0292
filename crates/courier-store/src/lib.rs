//! # courier-store
//!
//! SQLite persistence for the Courier messaging service.
//!
//! One `Store` over a connection pool carries the three durable concerns:
//!
//! - **Connection gate** - authorizes message operations against accepted
//!   mentor/mentee connections ([`connections`])
//! - **Message store** - persists messages and drives the
//!   sent/delivered/read status machine ([`messages`])
//! - **Notification fanout** - best-effort notification records
//!   ([`notifications`])
//!
//! Status transitions rely on single-statement atomicity with status guards
//! in the WHERE clause, never on application-level locks.

pub mod connections;
pub mod error;
pub mod messages;
pub mod notifications;

pub use error::StoreError;
pub use messages::NewMessage;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Embedded schema, applied idempotently at connect time.
const SCHEMA: &str = include_str!("schema.sql");

/// Handle to the Courier database.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url` and apply the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!(url = %url, "Store: database ready");

        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    ///
    /// The pool is pinned to a single connection: each SQLite in-memory
    /// connection is its own database, so a wider pool would scatter the
    /// tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
