use crate::model::flashcard::Flashcard;
use crate::model::quiz::QuizQuestion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three artifacts derived from an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Summary,
    Quiz,
    Flashcards,
}

impl ArtifactKind {
    /// All artifact kinds in canonical order.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Summary,
        ArtifactKind::Quiz,
        ArtifactKind::Flashcards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Summary => "SUMMARY",
            ArtifactKind::Quiz => "QUIZ",
            ArtifactKind::Flashcards => "FLASHCARDS",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUMMARY" => Ok(ArtifactKind::Summary),
            "QUIZ" => Ok(ArtifactKind::Quiz),
            "FLASHCARDS" | "FLASHCARD" => Ok(ArtifactKind::Flashcards),
            _ => Err(ParseError::new("artifact kind", s)),
        }
    }
}

/// Lifecycle status of a single artifact.
///
/// `Uploaded` is the initial state. `Ready` and `Error` are terminal for one
/// generation attempt; only an explicit regenerate moves a `Ready` artifact
/// back to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Uploaded => "UPLOADED",
            ArtifactStatus::Processing => "PROCESSING",
            ArtifactStatus::Ready => "READY",
            ArtifactStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactStatus::Ready | ArtifactStatus::Error)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(ArtifactStatus::Uploaded),
            "PROCESSING" => Ok(ArtifactStatus::Processing),
            "READY" => Ok(ArtifactStatus::Ready),
            "ERROR" => Ok(ArtifactStatus::Error),
            _ => Err(ParseError::new("artifact status", s)),
        }
    }
}

/// Cached summary of the three artifact statuses of a document.
///
/// Advisory only: the per-artifact statuses are authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl OverallStatus {
    /// Derives the overall status from the individual artifact statuses.
    ///
    /// `Processed` only when every artifact is ready, `Error` when at least one
    /// failed and none is still processing, `Uploaded` while nothing has been
    /// started, and `Processing` otherwise.
    pub fn derive<I>(statuses: I) -> OverallStatus
    where
        I: IntoIterator<Item = ArtifactStatus>,
    {
        let mut all_ready = true;
        let mut all_uploaded = true;
        let mut any_error = false;
        let mut any_processing = false;

        for status in statuses {
            all_ready &= status == ArtifactStatus::Ready;
            all_uploaded &= status == ArtifactStatus::Uploaded;
            any_error |= status == ArtifactStatus::Error;
            any_processing |= status == ArtifactStatus::Processing;
        }

        if all_ready {
            OverallStatus::Processed
        } else if any_error && !any_processing {
            OverallStatus::Error
        } else if all_uploaded {
            OverallStatus::Uploaded
        } else {
            OverallStatus::Processing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Uploaded => "UPLOADED",
            OverallStatus::Processing => "PROCESSING",
            OverallStatus::Processed => "PROCESSED",
            OverallStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverallStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(OverallStatus::Uploaded),
            "PROCESSING" => Ok(OverallStatus::Processing),
            "PROCESSED" => Ok(OverallStatus::Processed),
            "ERROR" => Ok(OverallStatus::Error),
            _ => Err(ParseError::new("overall status", s)),
        }
    }
}

/// The generated content of one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactPayload {
    Summary(String),
    Quiz(Vec<QuizQuestion>),
    Flashcards(Vec<Flashcard>),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactPayload::Summary(_) => ArtifactKind::Summary,
            ArtifactPayload::Quiz(_) => ArtifactKind::Quiz,
            ArtifactPayload::Flashcards(_) => ArtifactKind::Flashcards,
        }
    }

    /// True when the payload carries nothing worth presenting as ready:
    /// blank summary text, zero quiz questions or zero flashcards.
    pub fn is_degenerate(&self) -> bool {
        self.is_empty()
    }

    /// Number of items in the payload (1 for a non-empty summary).
    pub fn len(&self) -> usize {
        match self {
            ArtifactPayload::Summary(text) => usize::from(!text.trim().is_empty()),
            ArtifactPayload::Quiz(questions) => questions.len(),
            ArtifactPayload::Flashcards(cards) => cards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A value read from the wire or from storage that does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    what: &'static str,
    value: String,
}

impl ParseError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.what, self.value)
    }
}

impl std::error::Error for ParseError {}
