//! ShakeDraw Persistence Layer
//!
//! Provides:
//! - A small key-value store for user settings (folder list, last result)
//! - SQLite backing through an r2d2 pool
//! - An in-memory store for tests and ephemeral sessions

mod schema;
mod pool;
mod store;

pub use pool::{init_pool, DbPool};
pub use schema::migrate;
pub use store::{KeyValueStore, KeyValueStoreExt, MemoryStore, SqliteStore};

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Settings database file name
pub const DB_FILE_NAME: &str = "settings.db";

/// Get the database directory
pub fn db_dir() -> PathBuf {
    ProjectDirs::from("com", "ShakeDraw", "ShakeDraw")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Open the settings store in the default data directory
pub fn init() -> Result<SqliteStore> {
    SqliteStore::open(&db_dir())
}
