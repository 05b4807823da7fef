//! Client side of the external content-generation worker.
//!
//! The worker is an opaque service: given a loaded document it returns a
//! summary text, a list of quiz questions or a list of flashcards, or fails.
//! `GenerationWorker` is the seam the orchestrator depends on;
//! `HttpGenerationWorker` is the production implementation.

mod http;

pub use http::HttpGenerationWorker;

use async_trait::async_trait;
use common::model::artifact::{ArtifactKind, ArtifactPayload};
use std::path::PathBuf;
use thiserror::Error;

/// What the worker needs to know about a document to generate from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInput {
    pub document_id: String,
    pub document_name: String,
    /// File holding the uploaded document bytes.
    pub content_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Network failure, timeout or 5xx from the worker.
    #[error("generation worker unavailable: {0}")]
    Unavailable(String),

    /// The worker answered but reported a failure of its own.
    #[error("generation worker rejected the request: {0}")]
    Rejected(String),

    #[error("malformed worker response: {0}")]
    Malformed(String),

    /// The uploaded document could not be read.
    #[error("document content unavailable: {0}")]
    Content(String),
}

#[async_trait]
pub trait GenerationWorker: Send + Sync {
    /// Generates one artifact for the document.
    ///
    /// The returned payload is not validated here: an empty quiz is a
    /// successful call that the orchestrator rejects afterwards.
    async fn generate(
        &self,
        input: &GenerationInput,
        kind: ArtifactKind,
    ) -> Result<ArtifactPayload, WorkerError>;

    /// Reports whether the worker is reachable and healthy.
    async fn health(&self) -> bool;
}
