//! Vector index adapter: one named collection of embedding records per
//! document, stored as a single file under the vector directory.
//!
//! Collection naming is deterministic from the document id
//! (`doc_{id}_embeddings.json`), so the coordinator can re-open a collection
//! without a lookup table. Records carry identifier-only references back to
//! hierarchy nodes; a miss against the tree at query time is recoverable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::{EmbeddingRecord, SearchHit};

pub struct VectorIndex {
    root: PathBuf,
}

/// A cheap handle to one document's collection. Opening a handle does not
/// read vector data into memory; search streams records from disk.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    pub doc_id: i64,
    path: PathBuf,
}

impl VectorIndex {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn collection_path(&self, doc_id: i64) -> PathBuf {
        self.root.join(format!("doc_{}_embeddings.json", doc_id))
    }

    /// Create an empty collection for a document, replacing any existing one.
    pub fn create_or_replace_collection(
        &self,
        doc_id: i64,
    ) -> Result<CollectionHandle, StoreError> {
        let path = self.collection_path(doc_id);
        write_records(&path, &[])?;
        Ok(CollectionHandle { doc_id, path })
    }

    /// Open an existing collection.
    pub fn open_collection(&self, doc_id: i64) -> Result<CollectionHandle, StoreError> {
        let path = self.collection_path(doc_id);
        if !path.exists() {
            return Err(StoreError::CollectionMissing { doc_id });
        }
        Ok(CollectionHandle { doc_id, path })
    }

    /// Insert or replace records by `node_ref`.
    pub fn upsert(
        &self,
        handle: &CollectionHandle,
        records: &[EmbeddingRecord],
    ) -> Result<(), StoreError> {
        let mut existing = read_records(&handle.path, handle.doc_id)?;
        for record in records {
            match existing.iter_mut().find(|r| r.node_ref == record.node_ref) {
                Some(slot) => *slot = record.clone(),
                None => existing.push(record.clone()),
            }
        }
        write_records(&handle.path, &existing)
    }

    /// Rank all records against a query vector by cosine similarity.
    /// Returns at most `top_k` hits in descending score order.
    pub fn similarity_search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let records = read_records(&handle.path, handle.doc_id)?;

        let mut hits: Vec<SearchHit> = records
            .iter()
            .map(|r| SearchHit {
                node_ref: r.node_ref.clone(),
                score: cosine_similarity(query_vector, &r.vector),
                excerpt: r.excerpt.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    pub fn record_count(&self, handle: &CollectionHandle) -> Result<usize, StoreError> {
        Ok(read_records(&handle.path, handle.doc_id)?.len())
    }

    /// Delete a document's collection. Absent collections are a no-op.
    pub fn delete_collection(&self, doc_id: i64) -> Result<(), StoreError> {
        match fs::remove_file(self.collection_path(doc_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Collection count and total record count across all documents.
    pub fn stats(&self) -> Result<(usize, usize), StoreError> {
        let mut collections = 0usize;
        let mut records = 0usize;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(doc_id) = parse_doc_id(name) {
                collections += 1;
                records += read_records(&entry.path(), doc_id)?.len();
            }
        }
        Ok((collections, records))
    }

    /// Total size in bytes of all collection files.
    pub fn total_size(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            total += entry.metadata()?.len();
        }
        Ok(total)
    }

    /// Delete collections whose document id is no longer registered, plus
    /// temp files left behind by interrupted writes (never authoritative,
    /// even for live documents). Returns the number removed. Used by
    /// `vacuum`.
    pub fn sweep_orphans(&self, live_doc_ids: &[i64]) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".tmp") {
                fs::remove_file(entry.path())?;
                removed += 1;
                continue;
            }
            let Some(doc_id) = parse_doc_id(name) else {
                continue;
            };
            if !live_doc_ids.contains(&doc_id) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn read_records(path: &Path, doc_id: i64) -> Result<Vec<EmbeddingRecord>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::CollectionMissing { doc_id });
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::ArtifactCorrupt(format!("{}: {e}", path.display())))
}

fn write_records(path: &Path, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(records)
        .map_err(|e| StoreError::StoreUnavailable(format!("serialize collection: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn parse_doc_id(name: &str) -> Option<i64> {
    let rest = name.strip_prefix("doc_")?;
    let rest = rest.strip_suffix("_embeddings.json")?;
    rest.parse().ok()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(node_ref: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            node_ref: node_ref.to_string(),
            vector,
            excerpt: format!("excerpt for {}", node_ref),
        }
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn collection_naming_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        index.create_or_replace_collection(42).unwrap();
        assert!(tmp.path().join("doc_42_embeddings.json").exists());
        // Re-open without any lookup table
        index.open_collection(42).unwrap();
    }

    #[test]
    fn open_missing_collection_fails() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        let err = index.open_collection(9).unwrap_err();
        assert!(matches!(err, StoreError::CollectionMissing { doc_id: 9 }));
    }

    #[test]
    fn search_orders_descending_and_truncates() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        let handle = index.create_or_replace_collection(1).unwrap();

        index
            .upsert(
                &handle,
                &[
                    record("a", vec![1.0, 0.0]),
                    record("b", vec![0.9, 0.1]),
                    record("c", vec![0.0, 1.0]),
                    record("d", vec![-1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = index.similarity_search(&handle, &[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].node_ref, "a");
        assert_eq!(hits[1].node_ref, "b");
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn search_returns_fewer_when_collection_is_small() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        let handle = index.create_or_replace_collection(1).unwrap();
        index.upsert(&handle, &[record("only", vec![1.0])]).unwrap();

        let hits = index.similarity_search(&handle, &[1.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn upsert_replaces_by_node_ref() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        let handle = index.create_or_replace_collection(1).unwrap();

        index.upsert(&handle, &[record("a", vec![1.0, 0.0])]).unwrap();
        index.upsert(&handle, &[record("a", vec![0.0, 1.0])]).unwrap();

        assert_eq!(index.record_count(&handle).unwrap(), 1);
        let hits = index.similarity_search(&handle, &[0.0, 1.0], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn delete_collection_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();
        index.create_or_replace_collection(5).unwrap();
        index.delete_collection(5).unwrap();
        index.delete_collection(5).unwrap();
    }

    #[test]
    fn sweep_removes_stale_temp_files_and_orphans() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();

        let handle = index.create_or_replace_collection(1).unwrap();
        index.upsert(&handle, &[record("a", vec![1.0])]).unwrap();
        index.create_or_replace_collection(2).unwrap();
        // Leftover from a write interrupted before the rename
        std::fs::write(tmp.path().join("doc_1_embeddings.json.tmp"), b"[").unwrap();

        let removed = index.sweep_orphans(&[1]).unwrap();
        assert_eq!(removed, 2);
        assert!(!tmp.path().join("doc_1_embeddings.json.tmp").exists());
        assert_eq!(index.record_count(&handle).unwrap(), 1);
        assert!(index.open_collection(2).is_err());
    }

    #[test]
    fn create_or_replace_discards_previous_records() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).unwrap();

        let handle = index.create_or_replace_collection(1).unwrap();
        index.upsert(&handle, &[record("a", vec![1.0])]).unwrap();

        let handle = index.create_or_replace_collection(1).unwrap();
        assert_eq!(index.record_count(&handle).unwrap(), 0);
    }
}
