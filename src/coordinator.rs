//! Cache coordinator: the single document-oriented API over the three
//! heterogeneous stores (SQLite metadata, filesystem objects, vector index).
//!
//! The coordinator owns the invalidation and staged-build protocol. Writes
//! to the object store and vector index always happen *before* the metadata
//! stage flag flips, so a crash mid-stage leaves the system looking
//! incomplete (safe to rebuild), never falsely complete. Any inconsistency
//! discovered while reading cached state degrades to "rebuild" rather than
//! serving partial data.
//!
//! One coordinator per storage root with write intent. Concurrent readers
//! against a complete cache are safe (all load paths are read-only);
//! concurrent builders are last-writer-wins with no merge.

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::db;
use crate::error::StoreError;
use crate::meta::MetadataStore;
use crate::migrate;
use crate::models::{
    ArtifactKind, DocumentTree, EmbeddingRecord, IndexStructures, Stage, SummarySet,
};
use crate::objects::ObjectStore;
use crate::vectors::{CollectionHandle, VectorIndex};

pub struct CacheCoordinator {
    meta: MetadataStore,
    objects: ObjectStore,
    vectors: VectorIndex,
}

/// Scoped permission to build one stage of one document. The stage flag
/// flips only on explicit [`commit`]; dropping the guard leaves the stage
/// incomplete and any artifacts written during it untrusted.
///
/// [`commit`]: StageGuard::commit
#[must_use = "a stage guard that is never committed leaves the stage incomplete"]
pub struct StageGuard<'a> {
    coordinator: &'a CacheCoordinator,
    doc_id: i64,
    stage: Stage,
}

impl StageGuard<'_> {
    pub fn doc_id(&self) -> i64 {
        self.doc_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Mark the stage complete. This is always the last write of a stage;
    /// fails with [`StoreError::StageOrderViolation`] if the predecessor
    /// stage is incomplete.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.coordinator
            .meta
            .commit_stage(self.doc_id, self.stage)
            .await
    }
}

/// Artifacts produced by one build stage.
pub enum StagePayload {
    Parsed(DocumentTree),
    Indexed {
        index: IndexStructures,
        summaries: SummarySet,
    },
    Embedded(Vec<EmbeddingRecord>),
}

impl StagePayload {
    pub fn stage(&self) -> Stage {
        match self {
            StagePayload::Parsed(_) => Stage::Parsed,
            StagePayload::Indexed { .. } => Stage::Indexed,
            StagePayload::Embedded(_) => Stage::Embedded,
        }
    }
}

/// Everything a query pipeline needs from a complete cache.
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub tree: DocumentTree,
    pub index: IndexStructures,
    pub collection: CollectionHandle,
}

impl CacheCoordinator {
    /// Open (and if necessary create) the three stores under one root.
    pub async fn open(storage: &StorageConfig) -> anyhow::Result<Self> {
        let pool = db::connect(storage).await?;
        migrate::run_migrations(&pool).await?;

        Ok(Self {
            meta: MetadataStore::new(pool),
            objects: ObjectStore::open(&storage.objects_dir())?,
            vectors: VectorIndex::open(&storage.vectors_dir())?,
        })
    }

    pub fn meta(&self) -> &MetadataStore {
        &self.meta
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    /// Register a source file, returning its document id. Idempotent on
    /// path: an already-registered path returns the existing id unchanged,
    /// and the stored fingerprint is not touched.
    pub async fn register_document(
        &self,
        source_path: &str,
        display_name: Option<&str>,
    ) -> Result<i64, StoreError> {
        if let Some(existing) = self.meta.find_by_path(source_path).await? {
            return Ok(existing.id);
        }

        let fingerprint = fingerprint_file(Path::new(source_path))?;
        let name = display_name
            .map(str::to_string)
            .or_else(|| {
                Path::new(source_path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| source_path.to_string());

        let doc_id = self
            .meta
            .insert_document(source_path, &fingerprint, &name)
            .await?;
        info!(doc_id, source_path, "registered document");
        Ok(doc_id)
    }

    /// True iff every stage is complete and the live source bytes still
    /// match the stored fingerprint. Re-hashes the source on every check;
    /// there is no mtime shortcut.
    pub async fn is_cache_valid(&self, doc_id: i64) -> Result<bool, StoreError> {
        let doc = self.meta.get_document(doc_id).await?;

        let status = self.meta.stage_status(doc_id).await?;
        if !status.is_complete() {
            return Ok(false);
        }

        let current = fingerprint_file(Path::new(&doc.source_path))?;
        if current != doc.content_fingerprint {
            info!(doc_id, "source content changed, cache is stale");
            return Ok(false);
        }

        Ok(true)
    }

    /// Purge all derived artifacts for a document and reset its stage flags,
    /// preserving the document row and id. Idempotent; missing artifacts
    /// are no-ops. Flags are reset before artifacts are purged so a crash
    /// mid-invalidate still leaves the cache conservatively incomplete.
    pub async fn invalidate(&self, doc_id: i64) -> Result<(), StoreError> {
        self.meta.get_document(doc_id).await?;

        self.meta.reset_stages(doc_id).await?;
        self.meta.clear_summary(doc_id).await?;
        self.objects.delete_all(doc_id)?;
        self.vectors.delete_collection(doc_id)?;
        info!(doc_id, "cache invalidated");
        Ok(())
    }

    /// Invalidate every registered document.
    pub async fn invalidate_all(&self) -> Result<usize, StoreError> {
        let ids = self.meta.list_doc_ids().await?;
        for &doc_id in &ids {
            self.invalidate(doc_id).await?;
        }
        Ok(ids.len())
    }

    /// Recompute and store the fingerprint of the live source. Called by the
    /// build pipeline when a rebuild starts, never by `register_document`.
    pub async fn refresh_fingerprint(&self, doc_id: i64) -> Result<(), StoreError> {
        let doc = self.meta.get_document(doc_id).await?;
        let fingerprint = fingerprint_file(Path::new(&doc.source_path))?;
        self.meta.update_fingerprint(doc_id, &fingerprint).await
    }

    /// Begin a build stage. The returned guard must be explicitly committed
    /// for the stage flag to flip.
    pub async fn begin_stage(
        &self,
        doc_id: i64,
        stage: Stage,
    ) -> Result<StageGuard<'_>, StoreError> {
        self.meta.get_document(doc_id).await?;
        Ok(StageGuard {
            coordinator: self,
            doc_id,
            stage,
        })
    }

    /// Write a stage's artifacts without committing the guard. Artifacts
    /// land in the object store / vector index first; they are not trusted
    /// until the guard commits.
    pub async fn write_artifacts(
        &self,
        guard: &StageGuard<'_>,
        payload: &StagePayload,
    ) -> Result<(), StoreError> {
        if guard.stage != payload.stage() {
            return Err(StoreError::StagePayloadMismatch {
                guard: guard.stage,
                payload: payload.stage(),
            });
        }

        match payload {
            StagePayload::Parsed(tree) => {
                self.objects
                    .put(guard.doc_id, ArtifactKind::HierarchyTree, tree)?;
                self.meta
                    .replace_summary(guard.doc_id, &tree.counts_by_kind())
                    .await?;
            }
            StagePayload::Indexed { index, summaries } => {
                self.objects
                    .put(guard.doc_id, ArtifactKind::IndexStructures, index)?;
                self.objects
                    .put(guard.doc_id, ArtifactKind::Summaries, summaries)?;
            }
            StagePayload::Embedded(records) => {
                let handle = self.vectors.create_or_replace_collection(guard.doc_id)?;
                self.vectors.upsert(&handle, records)?;
            }
        }
        Ok(())
    }

    /// Write a stage's artifacts and commit the guard. From the caller's
    /// point of view the overwrite is atomic: either artifacts and flag both
    /// land, or nothing is trusted.
    pub async fn persist_artifacts(
        &self,
        guard: StageGuard<'_>,
        payload: &StagePayload,
    ) -> Result<(), StoreError> {
        self.write_artifacts(&guard, payload).await?;
        guard.commit().await
    }

    /// Load all cached artifacts for a complete, valid document. Fails with
    /// [`StoreError::CacheMiss`] when the cache is incomplete or stale; a
    /// missing artifact behind complete flags is store-level inconsistency
    /// and is surfaced as a rebuildable error.
    pub async fn load_artifacts(&self, doc_id: i64) -> Result<LoadedArtifacts, StoreError> {
        if !self.is_cache_valid(doc_id).await? {
            return Err(StoreError::CacheMiss { doc_id });
        }

        let tree = self.read_or_warn(doc_id, ArtifactKind::HierarchyTree)?;
        let index = self.read_or_warn(doc_id, ArtifactKind::IndexStructures)?;
        let collection = match self.vectors.open_collection(doc_id) {
            Ok(h) => h,
            Err(e) => {
                warn!(doc_id, error = %e, "vector collection inconsistent with stage flags");
                return Err(e);
            }
        };

        Ok(LoadedArtifacts {
            tree,
            index,
            collection,
        })
    }

    /// Rank a document's embedding records against a query vector. Requires
    /// a complete, valid cache.
    pub async fn search(
        &self,
        doc_id: i64,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<crate::models::SearchHit>, StoreError> {
        if !self.is_cache_valid(doc_id).await? {
            return Err(StoreError::CacheMiss { doc_id });
        }
        let handle = self.vectors.open_collection(doc_id)?;
        self.vectors.similarity_search(&handle, query_vector, top_k)
    }

    fn read_or_warn<T: serde::de::DeserializeOwned>(
        &self,
        doc_id: i64,
        kind: ArtifactKind,
    ) -> Result<T, StoreError> {
        self.objects.get(doc_id, kind).map_err(|e| {
            if e.is_rebuildable() {
                warn!(doc_id, %kind, error = %e, "artifact inconsistent with stage flags");
            }
            e
        })
    }
}

/// Content fingerprint of a source file: Sha256 over the raw bytes, hex
/// encoded. Content-derived identity is the sole change-detection signal.
pub fn fingerprint_file(path: &Path) -> Result<String, StoreError> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
