#![allow(dead_code)]

use async_trait::async_trait;
use backend::job_controller::orchestrator::Orchestrator;
use backend::store::ArtifactStore;
use backend::worker::{GenerationInput, GenerationWorker, WorkerError};
use common::model::artifact::{ArtifactKind, ArtifactPayload};
use common::model::flashcard::Flashcard;
use common::model::quiz::QuizQuestion;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer of the fake worker.
pub struct Reply {
    pub delay: Duration,
    pub result: Result<ArtifactPayload, String>,
}

impl Reply {
    pub fn ok(payload: ArtifactPayload) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(payload),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(reason.to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Worker answering from per-artifact queues. An empty queue answers with a
/// valid default payload.
#[derive(Default)]
pub struct ScriptedWorker {
    replies: Mutex<HashMap<ArtifactKind, VecDeque<Reply>>>,
    calls: Mutex<HashMap<ArtifactKind, usize>>,
    pub healthy: bool,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    pub fn script(self, kind: ArtifactKind, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self, kind: ArtifactKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl GenerationWorker for ScriptedWorker {
    async fn generate(
        &self,
        _input: &GenerationInput,
        kind: ArtifactKind,
    ) -> Result<ArtifactPayload, WorkerError> {
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::ok(default_payload(kind)));

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result.map_err(WorkerError::Rejected)
    }

    async fn health(&self) -> bool {
        self.healthy
    }
}

pub fn summary(text: &str) -> ArtifactPayload {
    ArtifactPayload::Summary(text.to_string())
}

pub fn quiz(n: usize) -> ArtifactPayload {
    ArtifactPayload::Quiz(
        (1..=n)
            .map(|i| QuizQuestion {
                question_type: "mcq".into(),
                question: format!("Question {}?", i),
                correct_answer: "B".into(),
                points: 1,
                options: Some(vec!["A".into(), "B".into(), "C".into()]),
            })
            .collect(),
    )
}

pub fn flashcards(n: usize) -> ArtifactPayload {
    ArtifactPayload::Flashcards(
        (1..=n)
            .map(|i| Flashcard {
                question: format!("Term {}", i),
                answer: format!("Definition {}", i),
                difficulty: "easy".into(),
            })
            .collect(),
    )
}

pub fn default_payload(kind: ArtifactKind) -> ArtifactPayload {
    match kind {
        ArtifactKind::Summary => summary("A short summary of the document."),
        ArtifactKind::Quiz => quiz(3),
        ArtifactKind::Flashcards => flashcards(4),
    }
}

/// Orchestrator over an in-memory store with one registered document `d1`.
pub fn orchestrator(worker: Arc<ScriptedWorker>, aggregate_timeout: Duration) -> Orchestrator {
    let store = ArtifactStore::open_in_memory().unwrap();
    store.create("d1", "biology.pdf").unwrap();
    Orchestrator::new(
        Arc::new(store),
        worker,
        "/tmp/studydeck-uploads".into(),
        aggregate_timeout,
    )
}

/// Lets every runnable generation task make progress before returning.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
