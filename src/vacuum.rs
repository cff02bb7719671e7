//! The vacuum command: compact the metadata database and sweep orphaned
//! artifacts out of the object store and vector index.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::coordinator::CacheCoordinator;

/// Run the vacuum command.
///
/// Reports the page count before and after the SQLite `VACUUM`, then removes
/// blobs and collections whose document id is no longer registered.
pub async fn run_vacuum(config: &Config) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;
    let pool = coordinator.meta().pool();

    let before = page_count(pool).await?;
    sqlx::query("VACUUM").execute(pool).await?;
    let after = page_count(pool).await?;

    println!("Metadata: {} pages -> {} pages", before, after);

    let live = coordinator.meta().list_doc_ids().await?;
    let swept_objects = coordinator.objects().sweep_orphans(&live)?;
    let swept_collections = coordinator.vectors().sweep_orphans(&live)?;

    println!("Objects:  {} orphaned blob(s) removed", swept_objects);
    println!("Vectors:  {} orphaned collection(s) removed", swept_collections);
    Ok(())
}

async fn page_count(pool: &sqlx::SqlitePool) -> Result<i64> {
    let row = sqlx::query("PRAGMA page_count").fetch_one(pool).await?;
    Ok(row.get(0))
}
