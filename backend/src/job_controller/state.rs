//! Shared state and messages of the generation job system.
//!
//! Generation runs outside the request/response cycle. The components here
//! connect the two sides:
//! - `AppState`: the clonable handle injected into the Actix application in
//!   `main.rs`, giving handlers access to the orchestrator.
//! - `TaskCompletion`: the message a finished generation task sends back to
//!   whoever launched it. Results themselves always go through the artifact
//!   store first; the message only says that the task is done and how.
//! - `collect_completions`: the fan-in loop that drains those messages.

use crate::job_controller::orchestrator::Orchestrator;
use common::model::artifact::ArtifactKind;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Generate every artifact as soon as a document is registered, unless the
    /// registration request says otherwise.
    pub auto_generate: bool,
}

/// How a generation task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The payload was persisted and the artifact is `READY`.
    Ready { items: usize },
    /// The artifact was marked `ERROR` with this message.
    Failed(String),
    /// A regenerate started a newer attempt; this result was discarded.
    Superseded,
}

/// Sent by a generation task once its result has been persisted.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub document_id: String,
    pub kind: ArtifactKind,
    pub epoch: u64,
    pub outcome: TaskOutcome,
}

/// Receives completions until `expected` of them arrived or every sender is gone.
pub async fn collect_completions(
    rx: &mut mpsc::Receiver<TaskCompletion>,
    expected: usize,
    into: &mut Vec<TaskCompletion>,
) {
    while into.len() < expected {
        match rx.recv().await {
            Some(completion) => into.push(completion),
            None => break,
        }
    }
}
