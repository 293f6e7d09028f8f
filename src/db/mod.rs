//! On-device cache backed by SQLite.
//!
//! Holds the user's collections and the recipes they favorited or
//! downloaded, so the app keeps working without a connection. Every write is
//! an upsert keyed by the entity id.

mod collection_repo;
pub mod list_codec;
mod saved_recipe_repo;

pub use collection_repo::CollectionRepository;
pub use saved_recipe_repo::{CacheFlag, CachedRecipe, SavedRecipeRepository};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to create database directory {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Corrupt cached row '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, CacheError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Io(parent.to_path_buf(), e))?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    // Writers queue for the lock instead of failing straight away
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Handle to the local cache. Cheap to clone.
#[derive(Clone)]
pub struct LocalCache {
    collections: CollectionRepository,
    recipes: SavedRecipeRepository,
}

impl LocalCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            collections: CollectionRepository::new(pool.clone()),
            recipes: SavedRecipeRepository::new(pool),
        }
    }

    /// Opens (creating if needed) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        Ok(Self::new(init_db(path).await?))
    }

    pub fn collections(&self) -> &CollectionRepository {
        &self.collections
    }

    pub fn recipes(&self) -> &SavedRecipeRepository {
        &self.recipes
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(id: &str, millis: i64) -> Result<DateTime<Utc>, CacheError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| CacheError::Corrupt {
        id: id.to_string(),
        reason: format!("timestamp {} out of range", millis),
    })
}

pub(crate) fn to_u32(id: &str, column: &str, value: i64) -> Result<u32, CacheError> {
    u32::try_from(value).map_err(|_| CacheError::Corrupt {
        id: id.to_string(),
        reason: format!("{} = {} is not a valid count", column, value),
    })
}

pub(crate) fn decode_column(id: &str, column: &str, value: &str) -> Result<Vec<String>, CacheError> {
    list_codec::decode_list(value).map_err(|e| CacheError::Corrupt {
        id: id.to_string(),
        reason: format!("{}: {}", column, e),
    })
}
