//! Error taxonomy for the cache coordinator and its stores.
//!
//! The split matters for callers: [`StoreError::CacheMiss`] and the two
//! missing-artifact variants are expected conditions that route the caller
//! back to the rebuild path, while [`StoreError::StoreUnavailable`] is fatal
//! for the current operation and [`StoreError::StageOrderViolation`] is a
//! programming error that must never be silently corrected.

use crate::models::{ArtifactKind, Stage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The cache for this document is not complete and valid. Expected;
    /// the caller should run the build pipeline.
    #[error("cache miss for document {doc_id}: cache is incomplete or stale")]
    CacheMiss { doc_id: i64 },

    /// A large object that the metadata store claims should exist is absent.
    #[error("artifact {kind} missing for document {doc_id}")]
    ArtifactMissing { doc_id: i64, kind: ArtifactKind },

    /// The vector collection for this document does not exist.
    #[error("vector collection missing for document {doc_id}")]
    CollectionMissing { doc_id: i64 },

    /// The document id is not registered at all.
    #[error("document {doc_id} is not registered")]
    DocumentNotFound { doc_id: i64 },

    /// Attempted to commit a stage whose predecessor is incomplete.
    #[error("stage order violation: cannot commit '{stage}' while '{missing}' is incomplete")]
    StageOrderViolation { stage: Stage, missing: Stage },

    /// A payload was handed to a guard for a different stage.
    #[error("stage payload mismatch: guard is for '{guard}', payload is for '{payload}'")]
    StagePayloadMismatch { guard: Stage, payload: Stage },

    /// The underlying storage engine is unreachable or misbehaving.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An artifact on disk could not be decoded.
    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::StoreUnavailable(format!("metadata store: {e}"))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::StoreUnavailable(format!("filesystem store: {e}"))
    }
}

impl StoreError {
    /// True for conditions that should degrade to "rebuild" rather than
    /// surface as an operator error.
    pub fn is_rebuildable(&self) -> bool {
        matches!(
            self,
            StoreError::CacheMiss { .. }
                | StoreError::ArtifactMissing { .. }
                | StoreError::CollectionMissing { .. }
                | StoreError::ArtifactCorrupt(_)
        )
    }
}
