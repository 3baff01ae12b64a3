//! Database layer for labflow.
//!
//! Row operations are free functions over `&Connection` so the workflow can run
//! several of them inside one [`rusqlite::Transaction`] (which derefs to a
//! connection). [`Database`] owns the connection and offers convenience methods
//! for catalog and patient seeding.

mod schema;
pub mod catalog;
pub mod order_exams;
pub mod orders;
pub mod patients;
pub mod results;
pub mod sequences;

pub use schema::*;

use rusqlite::{Connection, Transaction};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::models::UnknownVariant;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl From<UnknownVariant> for DbError {
    fn from(e: UnknownVariant) -> Self {
        DbError::Constraint(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open the store described by `config`.
    pub fn open_with_config(config: &DatabaseConfig) -> DbResult<Self> {
        let db = match &config.path {
            Some(path) => Self::open(path)?,
            None => Self::open_in_memory()?,
        };
        db.conn.busy_timeout(config.busy_timeout())?;
        debug!(path = ?config.path, busy_timeout_ms = config.busy_timeout_ms, "database opened");
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a deferred transaction.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}
