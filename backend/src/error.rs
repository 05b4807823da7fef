use crate::store::StoreError;
use crate::worker::WorkerError;
use common::model::artifact::ArtifactKind;
use thiserror::Error;

/// Hard failures of an orchestrator call.
///
/// Generation problems never show up here; they end as `ERROR` on the
/// affected artifact.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("artifact store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentNotFound(id) => OrchestratorError::DocumentNotFound(id),
            StoreError::AlreadyExists(id) => OrchestratorError::AlreadyExists(id),
            other => OrchestratorError::Store(other),
        }
    }
}

/// Why one generation attempt ended in `ERROR`.
///
/// Its `Display` output is the message stored next to the artifact.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("generation worker returned an empty {0}")]
    EmptyResult(ArtifactKind),

    #[error("generation worker returned a {found} payload when {expected} was requested")]
    WrongKind {
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    #[error("generation task aborted: {0}")]
    Aborted(String),
}
