//! Object store: content-addressed persistence of large build artifacts.
//!
//! One blob per `(doc_id, kind)` under a flat directory. Writes go to a
//! temporary file first and are renamed into place, so a reader never
//! observes a half-written blob. No versioning; overwrite is wholesale.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::ArtifactKind;

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn blob_path(&self, doc_id: i64, kind: ArtifactKind) -> PathBuf {
        self.root.join(format!("doc_{}_{}.json", doc_id, kind.as_str()))
    }

    /// Serialize and store an artifact, replacing any existing blob.
    pub fn put<T: Serialize>(
        &self,
        doc_id: i64,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StoreError::StoreUnavailable(format!("serialize {kind}: {e}")))?;

        let path = self.blob_path(doc_id, kind);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load and deserialize an artifact.
    pub fn get<T: DeserializeOwned>(
        &self,
        doc_id: i64,
        kind: ArtifactKind,
    ) -> Result<T, StoreError> {
        let path = self.blob_path(doc_id, kind);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ArtifactMissing { doc_id, kind });
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::ArtifactCorrupt(format!("{}: {e}", path.display())))
    }

    /// Delete one artifact. Absent blobs are a no-op.
    pub fn delete(&self, doc_id: i64, kind: ArtifactKind) -> Result<(), StoreError> {
        match fs::remove_file(self.blob_path(doc_id, kind)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every artifact owned by a document.
    pub fn delete_all(&self, doc_id: i64) -> Result<(), StoreError> {
        for kind in ArtifactKind::ALL {
            self.delete(doc_id, kind)?;
        }
        Ok(())
    }

    /// Total size in bytes of all stored blobs.
    pub fn total_size(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "json") {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    /// Delete blobs whose document id is no longer registered, plus temp
    /// files left behind by interrupted writes (never authoritative, even
    /// for live documents). Returns the number of files removed. Used by
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

/// Extract the document id from a `doc_{id}_...` blob filename.
fn parse_doc_id(name: &str) -> Option<i64> {
    let rest = name.strip_prefix("doc_")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentTree, NodeKind, TreeNode};
    use tempfile::TempDir;

    fn sample_tree() -> DocumentTree {
        DocumentTree {
            title: "Test Law".into(),
            roots: vec![TreeNode {
                node_ref: "p0".into(),
                kind: NodeKind::Part,
                heading: "PART ONE".into(),
                text: String::new(),
                children: vec![],
            }],
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        let tree = sample_tree();
        store.put(1, ArtifactKind::HierarchyTree, &tree).unwrap();

        let loaded: DocumentTree = store.get(1, ArtifactKind::HierarchyTree).unwrap();
        assert_eq!(loaded.title, tree.title);
        assert_eq!(loaded.node_count(), tree.node_count());
    }

    #[test]
    fn get_missing_is_artifact_missing() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        let err = store
            .get::<DocumentTree>(7, ArtifactKind::HierarchyTree)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ArtifactMissing { doc_id: 7, .. }
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        store.put(1, ArtifactKind::Summaries, &sample_tree()).unwrap();
        store.delete(1, ArtifactKind::Summaries).unwrap();
        // Second delete of an absent blob must not fail
        store.delete(1, ArtifactKind::Summaries).unwrap();
    }

    #[test]
    fn overwrite_replaces_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        let mut tree = sample_tree();
        store.put(1, ArtifactKind::HierarchyTree, &tree).unwrap();

        tree.title = "Revised Law".into();
        store.put(1, ArtifactKind::HierarchyTree, &tree).unwrap();

        let loaded: DocumentTree = store.get(1, ArtifactKind::HierarchyTree).unwrap();
        assert_eq!(loaded.title, "Revised Law");
        // No leftover temp files
        let tmp_files: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(tmp_files.is_empty());
    }

    #[test]
    fn sweep_removes_stale_temp_files_for_live_documents() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        store.put(1, ArtifactKind::HierarchyTree, &sample_tree()).unwrap();
        // Leftover from a write interrupted before the rename
        fs::write(tmp.path().join("doc_1_index_structures.json.tmp"), b"{").unwrap();

        let removed = store.sweep_orphans(&[1]).unwrap();
        assert_eq!(removed, 1);
        assert!(!tmp.path().join("doc_1_index_structures.json.tmp").exists());
        assert!(store.get::<DocumentTree>(1, ArtifactKind::HierarchyTree).is_ok());
    }

    #[test]
    fn sweep_removes_only_orphans() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::open(tmp.path()).unwrap();

        store.put(1, ArtifactKind::HierarchyTree, &sample_tree()).unwrap();
        store.put(2, ArtifactKind::HierarchyTree, &sample_tree()).unwrap();

        let removed = store.sweep_orphans(&[1]).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get::<DocumentTree>(1, ArtifactKind::HierarchyTree).is_ok());
        assert!(store.get::<DocumentTree>(2, ArtifactKind::HierarchyTree).is_err());
    }
}
