//! Metadata store: transactional access to document rows, cache-stage flags,
//! and hierarchy-node summary rows.
//!
//! The coordinator is the sole writer. The stage-flag flip in
//! [`MetadataStore::commit_stage`] is the single source of truth for
//! "is this document safe to load" and is always the last write of a stage.

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::models::{Document, NodeKind, Stage, StageStatus};

#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a new document with all stages seeded incomplete. Fails if the
    /// path is already registered; callers check [`find_by_path`] first.
    ///
    /// [`find_by_path`]: MetadataStore::find_by_path
    pub async fn insert_document(
        &self,
        source_path: &str,
        fingerprint: &str,
        display_name: &str,
    ) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (source_path, content_fingerprint, display_name, registered_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(source_path)
        .bind(fingerprint)
        .bind(display_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let doc_id = result.last_insert_rowid();

        for stage in Stage::ALL {
            sqlx::query(
                "INSERT INTO cache_stages (document_id, stage, completed) VALUES (?, ?, 0)",
            )
            .bind(doc_id)
            .bind(stage.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(doc_id)
    }

    pub async fn find_by_path(&self, source_path: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, source_path, content_fingerprint, display_name, registered_at, last_built_at
             FROM documents WHERE source_path = ?",
        )
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_document(&r)))
    }

    pub async fn get_document(&self, doc_id: i64) -> Result<Document, StoreError> {
        let row = sqlx::query(
            "SELECT id, source_path, content_fingerprint, display_name, registered_at, last_built_at
             FROM documents WHERE id = ?",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_document(&r))
            .ok_or(StoreError::DocumentNotFound { doc_id })
    }

    pub async fn list_documents(&self) -> Result<Vec<(Document, StageStatus)>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, source_path, content_fingerprint, display_name, registered_at, last_built_at
             FROM documents ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let doc = row_to_document(row);
            let status = self.stage_status(doc.id).await?;
            out.push((doc, status));
        }
        Ok(out)
    }

    pub async fn list_doc_ids(&self) -> Result<Vec<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM documents ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn stage_status(&self, doc_id: i64) -> Result<StageStatus, StoreError> {
        let rows = sqlx::query("SELECT stage, completed FROM cache_stages WHERE document_id = ?")
            .bind(doc_id)
            .fetch_all(&self.pool)
            .await?;

        let mut status = StageStatus::default();
        for row in &rows {
            let stage: String = row.get("stage");
            let completed: i64 = row.get("completed");
            match stage.as_str() {
                "parsed" => status.parsed = completed != 0,
                "indexed" => status.indexed = completed != 0,
                "embedded" => status.embedded = completed != 0,
                _ => {}
            }
        }
        Ok(status)
    }

    /// Flip a stage flag to complete. Re-checks the predecessor flag inside
    /// the same transaction; committing out of order is a
    /// [`StoreError::StageOrderViolation`], never silently reordered.
    pub async fn commit_stage(&self, doc_id: i64, stage: Stage) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        if let Some(predecessor) = stage.predecessor() {
            let done: Option<i64> = sqlx::query_scalar(
                "SELECT completed FROM cache_stages WHERE document_id = ? AND stage = ?",
            )
            .bind(doc_id)
            .bind(predecessor.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            if done.unwrap_or(0) == 0 {
                return Err(StoreError::StageOrderViolation {
                    stage,
                    missing: predecessor,
                });
            }
        }

        let updated = sqlx::query(
            "UPDATE cache_stages SET completed = 1, completed_at = ? WHERE document_id = ? AND stage = ?",
        )
        .bind(now)
        .bind(doc_id)
        .bind(stage.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound { doc_id });
        }

        sqlx::query("UPDATE documents SET last_built_at = ? WHERE id = ?")
            .bind(now)
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reset every stage flag to incomplete. Part of invalidation; the
    /// document row itself is preserved.
    pub async fn reset_stages(&self, doc_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE cache_stages SET completed = 0, completed_at = NULL WHERE document_id = ?",
        )
        .bind(doc_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_fingerprint(&self, doc_id: i64, fingerprint: &str) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE documents SET content_fingerprint = ? WHERE id = ?")
            .bind(fingerprint)
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound { doc_id });
        }
        Ok(())
    }

    /// Replace the node-kind summary rows for a document in one transaction.
    pub async fn replace_summary(
        &self,
        doc_id: i64,
        counts: &[(NodeKind, i64)],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM hierarchy_summary WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for (kind, count) in counts {
            sqlx::query(
                "INSERT INTO hierarchy_summary (document_id, node_kind, node_count) VALUES (?, ?, ?)",
            )
            .bind(doc_id)
            .bind(kind.as_str())
            .bind(count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn clear_summary(&self, doc_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM hierarchy_summary WHERE document_id = ?")
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Node counts by kind for one document, in structural order.
    pub async fn get_summary(&self, doc_id: i64) -> Result<Vec<(String, i64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT node_kind, node_count FROM hierarchy_summary
            WHERE document_id = ?
            ORDER BY
                CASE node_kind
                    WHEN 'part' THEN 1
                    WHEN 'chapter' THEN 2
                    WHEN 'section' THEN 3
                    WHEN 'article' THEN 4
                    WHEN 'clause' THEN 5
                END
            "#,
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("node_kind"), r.get("node_count")))
            .collect())
    }

    pub async fn document_count(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Number of documents with each stage complete, across the whole store.
    pub async fn stage_counts(&self) -> Result<[(Stage, i64); 3], StoreError> {
        let mut out = [
            (Stage::Parsed, 0i64),
            (Stage::Indexed, 0i64),
            (Stage::Embedded, 0i64),
        ];
        for (stage, count) in out.iter_mut() {
            *count = sqlx::query_scalar(
                "SELECT COUNT(*) FROM cache_stages WHERE stage = ? AND completed = 1",
            )
            .bind(stage.as_str())
            .fetch_one(&self.pool)
            .await?;
        }
        Ok(out)
    }

    /// Node counts by kind across all documents.
    pub async fn node_kind_totals(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT node_kind, SUM(node_count) AS total FROM hierarchy_summary
            GROUP BY node_kind
            ORDER BY
                CASE node_kind
                    WHEN 'part' THEN 1
                    WHEN 'chapter' THEN 2
                    WHEN 'section' THEN 3
                    WHEN 'article' THEN 4
                    WHEN 'clause' THEN 5
                END
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("node_kind"), r.get("total")))
            .collect())
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        source_path: row.get("source_path"),
        content_fingerprint: row.get("content_fingerprint"),
        display_name: row.get("display_name"),
        registered_at: row.get("registered_at"),
        last_built_at: row.get("last_built_at"),
    }
}
