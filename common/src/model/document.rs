use crate::model::artifact::{ArtifactKind, ArtifactPayload, ArtifactStatus, OverallStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted state of one artifact of a document.
///
/// `payload` is present if and only if `status` is `Ready`. `error` holds the
/// human-readable failure reason while `status` is `Error`. `epoch` counts
/// generation attempts and is used to discard results of superseded attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactState {
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ArtifactPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub epoch: u64,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of everything known about the artifacts of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentArtifacts {
    pub document_id: String,
    pub document_name: String,
    pub overall_status: OverallStatus,
    pub summary: ArtifactState,
    pub quiz: ArtifactState,
    pub flashcards: ArtifactState,
    pub updated_at: DateTime<Utc>,
}

impl DocumentArtifacts {
    pub fn artifact(&self, kind: ArtifactKind) -> &ArtifactState {
        match kind {
            ArtifactKind::Summary => &self.summary,
            ArtifactKind::Quiz => &self.quiz,
            ArtifactKind::Flashcards => &self.flashcards,
        }
    }

    pub fn statuses(&self) -> [ArtifactStatus; 3] {
        ArtifactKind::ALL.map(|kind| self.artifact(kind).status)
    }

    /// True while any artifact of the document is being generated.
    pub fn is_busy(&self) -> bool {
        self.statuses()
            .iter()
            .any(|status| *status == ArtifactStatus::Processing)
    }
}
