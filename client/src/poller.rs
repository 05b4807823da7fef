//! # Readiness Poller
//!
//! Without a push channel, observers learn about finished artifacts by
//! re-reading the document record. The poller runs one loop per
//! `(document, artifact)` pair:
//!
//! 1.  Fetch the record immediately and classify the artifact.
//! 2.  `READY` with usable content and `ERROR` are terminal: the loop publishes
//!     the view and stops for good. An artifact that was never started settles
//!     on `Pending` unless a sibling is still being generated.
//! 3.  Anything else waits one interval and fetches again. A failed fetch
//!     counts as an attempt.
//! 4.  After `max_attempts` fetches without a terminal state the view is forced
//!     to an error carrying a polling timeout.
//!
//! Loops are independent, so a slow quiz never holds back the summary, and a
//! pair that is already being polled is not polled twice.

use crate::error::ClientError;
use crate::source::StatusSource;
use common::model::artifact::{ArtifactKind, ArtifactPayload, ArtifactStatus};
use common::model::document::DocumentArtifacts;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Pause between two fetches of the same artifact.
    pub interval: Duration,
    /// Fetches per artifact before giving up.
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Why an observed artifact ended in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Reported by the server, verbatim.
    #[error("{0}")]
    Generation(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("artifact not ready after {attempts} status checks")]
    PollingTimeout { attempts: u32 },
}

/// What an observer currently knows about one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactView {
    Pending,
    Processing,
    Ready(ArtifactPayload),
    Error(ViewError),
}

impl ArtifactView {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactView::Ready(_) | ArtifactView::Error(_))
    }
}

impl fmt::Display for ArtifactView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactView::Pending => write!(f, "pending"),
            ArtifactView::Processing => write!(f, "processing"),
            ArtifactView::Ready(payload) => match payload {
                ArtifactPayload::Summary(text) => write!(f, "ready ({} characters)", text.len()),
                other => write!(f, "ready ({} items)", other.len()),
            },
            ArtifactView::Error(e) => write!(f, "error: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollKey {
    pub document_id: String,
    pub kind: ArtifactKind,
}

impl PollKey {
    pub fn new(document_id: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            document_id: document_id.into(),
            kind,
        }
    }
}

/// Published every time a view changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub key: PollKey,
    pub view: ArtifactView,
}

/// Result of classifying one fetch.
enum Step {
    /// Publish and stop polling.
    Settle(ArtifactView),
    /// Publish and poll again.
    Continue(ArtifactView),
    /// Keep the current view and poll again.
    Retry,
}

type Views = Arc<RwLock<HashMap<PollKey, ArtifactView>>>;

/// Removes a pair from the running set when its loop ends, however it ends.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<PollKey>>>,
    key: PollKey,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct ReadinessPoller {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
    active: Arc<Mutex<HashSet<PollKey>>>,
    views: Views,
    updates: Option<mpsc::Sender<ViewUpdate>>,
}

impl ReadinessPoller {
    pub fn new(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
            views: Arc::new(RwLock::new(HashMap::new())),
            updates: None,
        }
    }

    /// Also pushes every view change on `updates`.
    pub fn with_updates(mut self, updates: mpsc::Sender<ViewUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Starts polling every `(document, kind)` pair that is not already being
    /// polled and returns the handles of the loops it started. Each handle
    /// resolves to the final view of its pair.
    pub fn observe<I, S>(
        &self,
        document_ids: I,
        kinds: &[ArtifactKind],
    ) -> Vec<JoinHandle<ArtifactView>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut handles = Vec::new();
        for document_id in document_ids {
            let document_id = document_id.into();
            for &kind in kinds {
                let key = PollKey::new(document_id.clone(), kind);
                let fresh = self
                    .active
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.clone());
                if !fresh {
                    debug!("Already polling {} of document {}", kind, document_id);
                    continue;
                }

                let guard = ActiveGuard {
                    active: Arc::clone(&self.active),
                    key: key.clone(),
                };
                let poll = PollLoop {
                    source: Arc::clone(&self.source),
                    config: self.config,
                    views: Arc::clone(&self.views),
                    updates: self.updates.clone(),
                    key,
                };
                handles.push(tokio::spawn(async move {
                    let _guard = guard;
                    poll.run().await
                }));
            }
        }
        handles
    }

    pub fn is_polling(&self, document_id: &str, kind: ArtifactKind) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&PollKey::new(document_id, kind))
    }

    pub async fn view(&self, document_id: &str, kind: ArtifactKind) -> Option<ArtifactView> {
        self.views
            .read()
            .await
            .get(&PollKey::new(document_id, kind))
            .cloned()
    }

    pub async fn views(&self) -> HashMap<PollKey, ArtifactView> {
        self.views.read().await.clone()
    }
}

struct PollLoop {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
    views: Views,
    updates: Option<mpsc::Sender<ViewUpdate>>,
    key: PollKey,
}

impl PollLoop {
    async fn run(self) -> ArtifactView {
        let PollKey { document_id, kind } = &self.key;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let step = match self.source.fetch(document_id).await {
                Ok(record) => classify(&record, *kind),
                Err(ClientError::NotFound(id)) => {
                    Step::Settle(ArtifactView::Error(ViewError::DocumentNotFound(id)))
                }
                Err(e) => {
                    warn!(
                        "Status check {} for {} of document {} failed: {}",
                        attempts, kind, document_id, e
                    );
                    Step::Retry
                }
            };

            match step {
                Step::Settle(view) => {
                    info!("{} of document {} settled: {}", kind, document_id, view);
                    self.publish(view.clone()).await;
                    return view;
                }
                Step::Continue(view) => self.publish(view).await,
                Step::Retry => {}
            }

            if attempts >= self.config.max_attempts {
                let view = ArtifactView::Error(ViewError::PollingTimeout { attempts });
                warn!("{} of document {}: {}", kind, document_id, view);
                self.publish(view.clone()).await;
                return view;
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }

    async fn publish(&self, view: ArtifactView) {
        let previous = self.views.write().await.insert(self.key.clone(), view.clone());
        if previous.as_ref() == Some(&view) {
            return;
        }
        if let Some(updates) = &self.updates {
            let update = ViewUpdate {
                key: self.key.clone(),
                view,
            };
            // observers may have gone away
            let _ = updates.send(update).await;
        }
    }
}

fn classify(record: &DocumentArtifacts, kind: ArtifactKind) -> Step {
    let state = record.artifact(kind);
    match state.status {
        ArtifactStatus::Uploaded if record.is_busy() => Step::Continue(ArtifactView::Pending),
        ArtifactStatus::Uploaded => Step::Settle(ArtifactView::Pending),
        ArtifactStatus::Processing => Step::Continue(ArtifactView::Processing),
        ArtifactStatus::Ready => match &state.payload {
            Some(payload) if payload.kind() == kind && !payload.is_degenerate() => {
                Step::Settle(ArtifactView::Ready(payload.clone()))
            }
            _ => Step::Continue(ArtifactView::Processing),
        },
        ArtifactStatus::Error => {
            let message = state
                .error
                .clone()
                .unwrap_or_else(|| format!("{} generation failed", kind));
            Step::Settle(ArtifactView::Error(ViewError::Generation(message)))
        }
    }
}
