use crate::jobs::LaunchAck;
use crate::model::artifact::{ArtifactKind, OverallStatus};
use crate::model::document::DocumentArtifacts;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Request payload for registering an uploaded document.
///
/// The document bytes themselves are stored by the upload layer; registering
/// creates the artifact record with every artifact `UPLOADED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDocumentRequest {
    /// Identifier assigned at upload. A fresh UUID is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub document_name: String,
    /// Start generating all artifacts right away. Falls back to the server default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_generate: Option<bool>,
}

/// Request payload for `POST /api/documents/{id}/generate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Artifacts to generate. Absent or empty means all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<ArtifactKind>>,
    /// Block until every launched task finished or the server deadline expired.
    #[serde(default)]
    pub wait: bool,
}

impl GenerateRequest {
    pub fn requested(&self) -> BTreeSet<ArtifactKind> {
        match &self.artifacts {
            Some(kinds) if !kinds.is_empty() => kinds.iter().copied().collect(),
            _ => ArtifactKind::ALL.into_iter().collect(),
        }
    }
}

/// Response of the generate and regenerate endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub document_id: String,
    pub acknowledgements: BTreeMap<ArtifactKind, LaunchAck>,
    pub overall_status: OverallStatus,
    /// Final snapshot, only present when the caller waited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<DocumentArtifacts>,
    /// Artifacts still processing when the wait deadline expired.
    #[serde(default)]
    pub pending: Vec<ArtifactKind>,
    #[serde(default)]
    pub timed_out: bool,
}
