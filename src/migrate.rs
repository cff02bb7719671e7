use anyhow::Result;
use sqlx::SqlitePool;

/// Create the metadata store schema. Idempotent; safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents table: one row per distinct source path ever registered.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_path TEXT UNIQUE NOT NULL,
            content_fingerprint TEXT NOT NULL,
            display_name TEXT NOT NULL,
            registered_at INTEGER NOT NULL,
            last_built_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-stage completion flags. Rows are seeded incomplete at registration
    // so status reads never have to special-case missing rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_stages (
            document_id INTEGER NOT NULL,
            stage TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at INTEGER,
            PRIMARY KEY (document_id, stage),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Node counts by kind, redundant with the hierarchy_tree artifact, kept
    // here so inspection never touches the object store.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hierarchy_summary (
            document_id INTEGER NOT NULL,
            node_kind TEXT NOT NULL,
            node_count INTEGER NOT NULL,
            PRIMARY KEY (document_id, node_kind),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_stages_document ON cache_stages(document_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hierarchy_summary_document ON hierarchy_summary(document_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
