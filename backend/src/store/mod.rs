//! Persistence of document artifact records.
//!
//! Each document owns one row in `documents` plus one row per artifact in
//! `artifacts`, keyed by `(document_id, kind)`. All mutations are scoped to a
//! single artifact row; the cached overall status is recomputed from the
//! persisted artifact rows inside the same critical section.

mod artifact_store;

pub use artifact_store::ArtifactStore;

use common::model::artifact::{ArtifactKind, ArtifactStatus, ParseError};
use thiserror::Error;

/// How `ArtifactStore::begin` treats the current artifact status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginMode {
    /// Only `UPLOADED` and `ERROR` artifacts move to `PROCESSING`.
    Generate,
    /// Any artifact moves to `PROCESSING`, including `READY` and `PROCESSING` ones.
    Regenerate,
}

/// Result of the compare-and-swap performed by `ArtifactStore::begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// The artifact is now `PROCESSING` under the returned generation epoch.
    Started { epoch: u64 },
    /// The transition was not allowed; the artifact keeps this status.
    Skipped(ArtifactStatus),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// A result arrived for an attempt that has since been superseded.
    #[error("stale write for {kind} of document {document_id} at epoch {epoch}")]
    StaleWrite {
        document_id: String,
        kind: ArtifactKind,
        epoch: u64,
    },

    #[error("cannot store a {found} payload as {expected}")]
    PayloadMismatch {
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    #[error("corrupt record for document {0}: missing artifact rows")]
    Corrupt(String),

    #[error("unknown value in store: {0}")]
    UnknownValue(#[from] ParseError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid timestamp in store: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The blocking task running the operation panicked or was cancelled.
    #[error("store task failed: {0}")]
    Blocking(String),
}
