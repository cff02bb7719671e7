use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::StorageConfig;

pub async fn connect(storage: &StorageConfig) -> Result<SqlitePool> {
    let db_path = storage.metadata_db_path();

    // Ensure the storage root exists
    std::fs::create_dir_all(&storage.root)?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
