use serde::{Deserialize, Serialize};

/// Per-artifact acknowledgement returned when generation is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchAck {
    /// A new generation task was started for the artifact.
    Launched,
    /// A task for the artifact is already running; nothing was started.
    AlreadyProcessing,
    /// The artifact is already ready; use regenerate to replace it.
    AlreadyReady,
}

impl LaunchAck {
    pub fn launched(&self) -> bool {
        matches!(self, LaunchAck::Launched)
    }
}
