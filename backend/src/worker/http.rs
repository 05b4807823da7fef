use crate::worker::{GenerationInput, GenerationWorker, WorkerError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::model::artifact::{ArtifactKind, ArtifactPayload};
use common::model::flashcard::Flashcard;
use common::model::quiz::QuizQuestion;
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Prefix the worker puts in front of summary text when generation failed.
const SUMMARY_ERROR_PREFIX: &str = "ERROR:";

#[derive(Serialize)]
struct SessionLoadRequest<'a> {
    session_id: &'a str,
    document_name: &'a str,
    document_base64: String,
}

#[derive(Deserialize)]
struct SessionLoadResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    session_id: &'a str,
}

#[derive(Deserialize)]
struct SummaryResponse {
    response: String,
}

#[derive(Deserialize)]
struct QuizResponse {
    response: QuizBody,
}

#[derive(Deserialize)]
struct QuizBody {
    #[serde(default)]
    questions: Vec<QuizQuestion>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FlashcardResponse {
    response: FlashcardBody,
}

#[derive(Deserialize)]
struct FlashcardBody {
    #[serde(default)]
    flashcards: Vec<Flashcard>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// `GenerationWorker` speaking the worker's JSON-over-HTTP protocol.
///
/// Before the first generation call for a document the worker needs the
/// document itself (`POST /session/load`). The load happens once per document
/// even when several artifacts are requested at the same time. Any failed
/// artifact request forgets the session, so after a worker restart the next
/// regenerate sends the document again.
pub struct HttpGenerationWorker {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    sessions: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
}

impl HttpGenerationWorker {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, WorkerError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| WorkerError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, WorkerError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| WorkerError::Unavailable(format!("{}: {}", path, e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(WorkerError::Unavailable(format!("{} returned {}", path, status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Rejected(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_decode() {
                WorkerError::Malformed(format!("{}: {}", path, e))
            } else {
                WorkerError::Unavailable(format!("{}: {}", path, e))
            }
        })
    }

    fn session(&self, document_id: &str) -> Arc<OnceCell<()>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(document_id.to_string()).or_default())
    }

    fn forget_session(&self, document_id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);
    }

    async fn ensure_session(&self, input: &GenerationInput) -> Result<(), WorkerError> {
        // concurrent callers for one document wait on the same load
        self.session(&input.document_id)
            .get_or_try_init(|| self.load_session(input))
            .await
            .map(|_| ())
    }

    async fn load_session(&self, input: &GenerationInput) -> Result<(), WorkerError> {
        let bytes = tokio::fs::read(&input.content_path).await.map_err(|e| {
            WorkerError::Content(format!("{}: {}", input.content_path.display(), e))
        })?;
        let request = SessionLoadRequest {
            session_id: &input.document_id,
            document_name: &input.document_name,
            document_base64: STANDARD.encode(bytes),
        };

        let response: SessionLoadResponse = self.post_json("/session/load", &request).await?;
        if let Some(error) = response.error {
            return Err(WorkerError::Rejected(error));
        }
        info!(
            "Worker session ready for document {}: {}",
            input.document_id,
            response.message.unwrap_or_default()
        );
        Ok(())
    }

    async fn request_artifact(
        &self,
        document_id: &str,
        kind: ArtifactKind,
    ) -> Result<ArtifactPayload, WorkerError> {
        let request = SessionRequest {
            session_id: document_id,
        };
        match kind {
            ArtifactKind::Summary => summary_payload(self.post_json("/summary", &request).await?),
            ArtifactKind::Quiz => quiz_payload(self.post_json("/quiz", &request).await?),
            ArtifactKind::Flashcards => {
                flashcard_payload(self.post_json("/flashcard", &request).await?)
            }
        }
    }
}

fn summary_payload(response: SummaryResponse) -> Result<ArtifactPayload, WorkerError> {
    match response.response.trim_start().strip_prefix(SUMMARY_ERROR_PREFIX) {
        Some(reason) => Err(WorkerError::Rejected(reason.trim().to_string())),
        None => Ok(ArtifactPayload::Summary(response.response)),
    }
}

fn quiz_payload(response: QuizResponse) -> Result<ArtifactPayload, WorkerError> {
    let QuizBody { questions, error } = response.response;
    match error {
        Some(reason) if questions.is_empty() => Err(WorkerError::Rejected(reason)),
        _ => Ok(ArtifactPayload::Quiz(questions)),
    }
}

fn flashcard_payload(response: FlashcardResponse) -> Result<ArtifactPayload, WorkerError> {
    let FlashcardBody { flashcards, error } = response.response;
    match error {
        Some(reason) if flashcards.is_empty() => Err(WorkerError::Rejected(reason)),
        _ => Ok(ArtifactPayload::Flashcards(flashcards)),
    }
}

#[async_trait]
impl GenerationWorker for HttpGenerationWorker {
    async fn generate(
        &self,
        input: &GenerationInput,
        kind: ArtifactKind,
    ) -> Result<ArtifactPayload, WorkerError> {
        self.ensure_session(input).await?;
        debug!("Requesting {} for document {}", kind, input.document_id);

        let result = self.request_artifact(&input.document_id, kind).await;
        if let Err(e) = &result {
            warn!(
                "{} for document {} failed: {}; dropping cached session",
                kind, input.document_id, e
            );
            self.forget_session(&input.document_id);
        }
        result
    }

    async fn health(&self) -> bool {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(response) => match response.json::<HealthResponse>().await {
                Ok(health) => health.status == "healthy",
                Err(e) => {
                    warn!("Worker health response unreadable: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Generation worker not available: {}", e);
                false
            }
        }
    }
}
