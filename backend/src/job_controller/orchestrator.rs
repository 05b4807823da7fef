//! # Artifact Generation Orchestrator
//!
//! Launches one concurrent task per requested artifact and reconciles their
//! results into the artifact store.
//!
//! ## Workflow:
//!
//! 1.  **Check-and-set**: for every requested artifact the store is asked to move
//!     it to `PROCESSING` (`ArtifactStore::begin`). Only artifacts that actually
//!     transitioned get a task, so repeated `generate` calls never start
//!     duplicates. `regenerate` uses the unconditional mode.
//!
//! 2.  **Fan-out**: each started artifact gets its own Tokio task holding the
//!     generation epoch returned by the store. The worker call runs in a nested
//!     task so that a panic inside it still ends as `ERROR`.
//!
//! 3.  **Persist on completion**: a task validates the payload (empty content is
//!     a failure) and writes `READY` or `ERROR` for its own artifact only. A
//!     write for a superseded epoch is discarded.
//!
//! 4.  **Fan-in**: tasks report a `TaskCompletion` on an MPSC channel. Callers
//!     that want the aggregate outcome hand the `Launch` to `wait`, which
//!     collects completions under a single deadline. Tasks are detached: when
//!     the deadline fires they keep running and still persist their result.

use crate::error::{GenerationError, OrchestratorError};
use crate::job_controller::state::{collect_completions, TaskCompletion, TaskOutcome};
use crate::store::{ArtifactStore, Begin, BeginMode, StoreError};
use crate::worker::{GenerationInput, GenerationWorker};
use common::jobs::LaunchAck;
use common::model::artifact::{ArtifactKind, ArtifactPayload, ArtifactStatus, OverallStatus};
use common::model::document::DocumentArtifacts;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The tasks started by one `generate` or `regenerate` call.
pub struct Launch {
    pub document_id: String,
    pub acknowledgements: BTreeMap<ArtifactKind, LaunchAck>,
    /// Overall status right after the launch.
    pub overall_status: OverallStatus,
    completions: mpsc::Receiver<TaskCompletion>,
    launched: usize,
}

impl Launch {
    /// Number of tasks actually started.
    pub fn launched(&self) -> usize {
        self.launched
    }
}

/// Result of waiting for a launch.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub acknowledgements: BTreeMap<ArtifactKind, LaunchAck>,
    /// Store contents after the wait ended.
    pub snapshot: DocumentArtifacts,
    /// Requested artifacts still `PROCESSING` when the wait ended.
    pub pending: Vec<ArtifactKind>,
    pub timed_out: bool,
    pub completions: Vec<TaskCompletion>,
}

pub struct Orchestrator {
    store: Arc<ArtifactStore>,
    worker: Arc<dyn GenerationWorker>,
    uploads_dir: PathBuf,
    aggregate_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ArtifactStore>,
        worker: Arc<dyn GenerationWorker>,
        uploads_dir: PathBuf,
        aggregate_timeout: Duration,
    ) -> Self {
        Self {
            store,
            worker,
            uploads_dir,
            aggregate_timeout,
        }
    }

    pub fn worker(&self) -> &dyn GenerationWorker {
        self.worker.as_ref()
    }

    /// Creates the record of an uploaded document and optionally starts
    /// generating all of its artifacts in the background.
    pub async fn register(
        &self,
        document_id: &str,
        document_name: &str,
        auto_generate: bool,
    ) -> Result<DocumentArtifacts, OrchestratorError> {
        let (id, name) = (document_id.to_string(), document_name.to_string());
        let record = self
            .store
            .call(move |store| store.create(&id, &name))
            .await?;
        info!("Registered document {} ({})", document_id, document_name);

        if auto_generate {
            let all: BTreeSet<ArtifactKind> = ArtifactKind::ALL.into_iter().collect();
            let launch = self.generate(document_id, &all).await?;
            info!(
                "Started automatic generation of {} artifacts for document {}",
                launch.launched(),
                document_id
            );
            return self.status(document_id).await;
        }
        Ok(record)
    }

    /// Starts generation of every requested artifact that is not ready or
    /// already being generated.
    ///
    /// Fails only when the document is unknown.
    pub async fn generate(
        &self,
        document_id: &str,
        kinds: &BTreeSet<ArtifactKind>,
    ) -> Result<Launch, OrchestratorError> {
        self.launch(document_id, kinds, BeginMode::Generate).await
    }

    /// Forces one artifact back to `PROCESSING` and starts a new attempt,
    /// whatever its current status.
    ///
    /// A task of an earlier attempt that is still running is not cancelled; its
    /// result is discarded when it arrives.
    pub async fn regenerate(
        &self,
        document_id: &str,
        kind: ArtifactKind,
    ) -> Result<Launch, OrchestratorError> {
        self.launch(document_id, &BTreeSet::from([kind]), BeginMode::Regenerate)
            .await
    }

    /// `generate` followed by `wait`.
    pub async fn generate_and_wait(
        &self,
        document_id: &str,
        kinds: &BTreeSet<ArtifactKind>,
    ) -> Result<AggregateOutcome, OrchestratorError> {
        let launch = self.generate(document_id, kinds).await?;
        self.wait(launch).await
    }

    /// Waits until every task of `launch` finished or the aggregate deadline
    /// expired, then reports the stored state.
    ///
    /// Nothing is rolled back on timeout: finished artifacts keep their result
    /// and unfinished ones are listed in `pending`.
    pub async fn wait(&self, launch: Launch) -> Result<AggregateOutcome, OrchestratorError> {
        let Launch {
            document_id,
            acknowledgements,
            mut completions,
            launched,
            ..
        } = launch;

        let mut finished = Vec::with_capacity(launched);
        let timed_out = tokio::time::timeout(
            self.aggregate_timeout,
            collect_completions(&mut completions, launched, &mut finished),
        )
        .await
        .is_err();

        let snapshot = self.status(&document_id).await?;
        let pending: Vec<ArtifactKind> = acknowledgements
            .keys()
            .copied()
            .filter(|kind| !snapshot.artifact(*kind).status.is_terminal())
            .collect();

        if timed_out {
            warn!(
                "Gave up waiting for document {} after {:?}; still processing: {:?}",
                document_id, self.aggregate_timeout, pending
            );
        }

        Ok(AggregateOutcome {
            acknowledgements,
            snapshot,
            pending,
            timed_out,
            completions: finished,
        })
    }

    /// Current record of a document.
    pub async fn status(&self, document_id: &str) -> Result<DocumentArtifacts, OrchestratorError> {
        let id = document_id.to_string();
        self.store
            .call(move |store| store.snapshot(&id))
            .await?
            .ok_or_else(|| OrchestratorError::DocumentNotFound(document_id.to_string()))
    }

    async fn launch(
        &self,
        document_id: &str,
        kinds: &BTreeSet<ArtifactKind>,
        mode: BeginMode,
    ) -> Result<Launch, OrchestratorError> {
        let record = self.status(document_id).await?;
        let input = GenerationInput {
            document_id: document_id.to_string(),
            document_name: record.document_name.clone(),
            content_path: content_path(&self.uploads_dir, document_id, &record.document_name),
        };

        let (id, requested) = (document_id.to_string(), kinds.clone());
        let begun = self
            .store
            .call(move |store| {
                requested
                    .into_iter()
                    .map(|kind| store.begin(&id, kind, mode).map(|begin| (kind, begin)))
                    .collect::<Result<Vec<_>, StoreError>>()
            })
            .await?;

        let (tx, rx) = mpsc::channel(kinds.len().max(1));
        let mut acknowledgements = BTreeMap::new();
        for (kind, begin) in begun {
            let ack = match begin {
                Begin::Started { epoch } => {
                    self.spawn_task(input.clone(), kind, epoch, tx.clone());
                    LaunchAck::Launched
                }
                Begin::Skipped(ArtifactStatus::Ready) => LaunchAck::AlreadyReady,
                Begin::Skipped(status) => {
                    debug!(
                        "Not starting {} for document {}: artifact is {}",
                        kind, document_id, status
                    );
                    LaunchAck::AlreadyProcessing
                }
            };
            acknowledgements.insert(kind, ack);
        }
        let launched = acknowledgements.values().filter(|ack| ack.launched()).count();

        let overall_status = self.status(document_id).await?.overall_status;
        Ok(Launch {
            document_id: document_id.to_string(),
            acknowledgements,
            overall_status,
            completions: rx,
            launched,
        })
    }

    fn spawn_task(
        &self,
        input: GenerationInput,
        kind: ArtifactKind,
        epoch: u64,
        tx: mpsc::Sender<TaskCompletion>,
    ) {
        let store = Arc::clone(&self.store);
        let worker = Arc::clone(&self.worker);

        tokio::spawn(async move {
            info!(
                "Generating {} for document {} (attempt {})",
                kind, input.document_id, epoch
            );
            let document_id = input.document_id.clone();

            // A panic inside the worker call must still end as ERROR.
            let handle = tokio::spawn(async move { worker.generate(&input, kind).await });
            let result = match handle.await {
                Ok(Ok(payload)) => validate(kind, payload),
                Ok(Err(e)) => Err(GenerationError::Worker(e)),
                Err(e) => Err(GenerationError::Aborted(e.to_string())),
            };

            let outcome = persist(&store, &document_id, kind, epoch, result).await;
            // The launcher may have stopped listening; the store already has the result.
            let _ = tx
                .send(TaskCompletion {
                    document_id,
                    kind,
                    epoch,
                    outcome,
                })
                .await;
        });
    }
}

/// Where the upload layer keeps the bytes of a document.
fn content_path(uploads_dir: &Path, document_id: &str, document_name: &str) -> PathBuf {
    let file_name = Path::new(document_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    uploads_dir.join(format!("{}_{}", document_id, file_name))
}

/// A worker success only counts when it carries usable content of the right kind.
fn validate(
    kind: ArtifactKind,
    payload: ArtifactPayload,
) -> Result<ArtifactPayload, GenerationError> {
    if payload.kind() != kind {
        return Err(GenerationError::WrongKind {
            expected: kind,
            found: payload.kind(),
        });
    }
    if payload.is_degenerate() {
        return Err(GenerationError::EmptyResult(kind));
    }
    Ok(payload)
}

async fn mark_failed(
    store: &Arc<ArtifactStore>,
    document_id: &str,
    kind: ArtifactKind,
    epoch: u64,
    message: &str,
) -> Result<(), StoreError> {
    let (id, message) = (document_id.to_string(), message.to_string());
    store
        .call(move |store| store.fail(&id, kind, epoch, &message))
        .await
}

async fn persist(
    store: &Arc<ArtifactStore>,
    document_id: &str,
    kind: ArtifactKind,
    epoch: u64,
    result: Result<ArtifactPayload, GenerationError>,
) -> TaskOutcome {
    let (write, outcome) = match result {
        Ok(payload) => {
            let items = payload.len();
            let id = document_id.to_string();
            let write = store
                .call(move |store| store.complete(&id, kind, epoch, &payload))
                .await;
            (write, TaskOutcome::Ready { items })
        }
        Err(failure) => {
            let message = failure.to_string();
            let write = mark_failed(store, document_id, kind, epoch, &message).await;
            (write, TaskOutcome::Failed(message))
        }
    };

    match write {
        Ok(()) => {
            match &outcome {
                TaskOutcome::Ready { items } => info!(
                    "{} ready for document {} ({} items)",
                    kind, document_id, items
                ),
                TaskOutcome::Failed(message) => error!(
                    "{} failed for document {}: {}",
                    kind, document_id, message
                ),
                TaskOutcome::Superseded => {}
            }
            outcome
        }
        Err(StoreError::StaleWrite { .. }) => superseded(document_id, kind, epoch),
        Err(e) => {
            error!(
                "Failed to persist {} for document {}: {}",
                kind, document_id, e
            );
            // a task is the only writer of its epoch and must leave it terminal
            let message = format!("could not store the generated {}: {}", kind, e);
            match mark_failed(store, document_id, kind, epoch, &message).await {
                Ok(()) => TaskOutcome::Failed(message),
                Err(StoreError::StaleWrite { .. }) => superseded(document_id, kind, epoch),
                Err(e) => {
                    error!(
                        "{} of document {} is stuck in PROCESSING: {}",
                        kind, document_id, e
                    );
                    TaskOutcome::Failed(message)
                }
            }
        }
    }
}

fn superseded(document_id: &str, kind: ArtifactKind, epoch: u64) -> TaskOutcome {
    debug!(
        "Discarding {} result for document {} from superseded attempt {}",
        kind, document_id, epoch
    );
    TaskOutcome::Superseded
}
